//! Tag lookup and deck/note association

use rusqlite::{params, Connection};

use super::Database;
use crate::error::Result;
use crate::models::Tag;

/// Normalize raw tag input: trimmed, blanks dropped, case-insensitive dedupe
pub(crate) fn clean_tag_names(raw: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// Get a tag ID by name, creating the tag if needed
pub(crate) fn get_or_create_tag(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO tags (name) VALUES (?)",
        params![name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM tags WHERE name = ?",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub(crate) fn tag_deck(conn: &Connection, deck_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO deck_tags (deck_id, tag_id) VALUES (?, ?)",
        params![deck_id, tag_id],
    )?;
    Ok(())
}

pub(crate) fn tag_note(conn: &Connection, note_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?, ?)",
        params![note_id, tag_id],
    )?;
    Ok(())
}

/// Tag names attached to a deck, sorted by name
pub(crate) fn deck_tag_names(conn: &Connection, deck_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT t.name FROM tags t
        JOIN deck_tags dt ON dt.tag_id = t.id
        WHERE dt.deck_id = ?
        ORDER BY t.name
        "#,
    )?;
    let names = stmt
        .query_map(params![deck_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Tag names attached to a note, sorted by name
pub(crate) fn note_tag_names(conn: &Connection, note_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT t.name FROM tags t
        JOIN note_tags nt ON nt.tag_id = t.id
        WHERE nt.note_id = ?
        ORDER BY t.name
        "#,
    )?;
    let names = stmt
        .query_map(params![note_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

impl Database {
    /// Tags used on any of the user's notes or decks
    pub fn list_tags_for_user(&self, user_id: i64) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT t.id, t.name FROM tags t
            WHERE t.id IN (
                SELECT nt.tag_id FROM note_tags nt
                JOIN notes n ON n.id = nt.note_id
                WHERE n.user_id = ?1
                UNION
                SELECT dt.tag_id FROM deck_tags dt
                JOIN decks d ON d.id = dt.deck_id
                WHERE d.user_id = ?1
            )
            ORDER BY t.name
            "#,
        )?;

        let tags = stmt
            .query_map(params![user_id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tags)
    }
}
