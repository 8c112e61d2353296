//! Note editing and card search

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::tags::{clean_tag_names, get_or_create_tag, note_tag_names, tag_note};
use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{CardSearch, CardSearchResult, Note, NoteFields};

/// Maximum number of rows returned by a card search
pub const SEARCH_LIMIT: i64 = 200;

/// Parse a comma-separated list of IDs (e.g. `"1,4,7"`)
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Validation(format!("Invalid ID list: {}", raw)))
        })
        .collect()
}

impl CardSearch {
    /// Build WHERE conditions and parameters for the current user
    fn build(&self, user_id: i64) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["n.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            conditions.push("n.field_values LIKE ?".to_string());
            params.push(Box::new(format!("%{}%", query)));
        }

        if !self.tag_ids.is_empty() {
            let placeholders = vec!["?"; self.tag_ids.len()].join(", ");
            conditions.push(format!(
                "n.id IN (SELECT note_id FROM note_tags WHERE tag_id IN ({}))",
                placeholders
            ));
            for id in &self.tag_ids {
                params.push(Box::new(*id));
            }
        }

        if !self.deck_ids.is_empty() {
            let placeholders = vec!["?"; self.deck_ids.len()].join(", ");
            conditions.push(format!("f.deck_id IN ({})", placeholders));
            for id in &self.deck_ids {
                params.push(Box::new(*id));
            }
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

impl Database {
    /// Get a note the user owns
    pub fn get_note(&self, user_id: i64, note_id: i64) -> Result<Note> {
        let conn = self.conn()?;
        let row: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT user_id, field_values, created_at FROM notes WHERE id = ?",
                params![note_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((owner, raw, created)) if owner == user_id => {
                let fields = NoteFields::decode(&raw);
                Ok(Note {
                    id: note_id,
                    user_id,
                    front: fields.front,
                    back: fields.back,
                    tags: note_tag_names(&conn, note_id)?,
                    created_at: parse_datetime(&created),
                })
            }
            Some(_) => Err(Error::AccessDenied(format!("Note {} not found", note_id))),
            None => Err(Error::NotFound(format!("Note {} not found", note_id))),
        }
    }

    /// Replace a note's front/back and, when given, its tags
    ///
    /// The content change shows up on every card generated from the note.
    pub fn update_note(
        &self,
        user_id: i64,
        note_id: i64,
        front: &str,
        back: &str,
        tags: Option<&[String]>,
    ) -> Result<Note> {
        let fields = NoteFields::new(front, back)?;
        // Ownership check
        self.get_note(user_id, note_id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE notes SET field_values = ? WHERE id = ? AND user_id = ?",
            params![fields.encode()?, note_id, user_id],
        )?;

        if let Some(tags) = tags {
            tx.execute("DELETE FROM note_tags WHERE note_id = ?", params![note_id])?;
            for tag in clean_tag_names(tags) {
                let tag_id = get_or_create_tag(&tx, &tag)?;
                tag_note(&tx, note_id, tag_id)?;
            }
        }
        tx.commit()?;

        info!(note_id, "Note updated");
        self.get_note(user_id, note_id)
    }

    /// Delete a note and every card generated from it
    pub fn delete_note(&self, user_id: i64, note_id: i64) -> Result<()> {
        self.get_note(user_id, note_id)?;
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM notes WHERE id = ? AND user_id = ?",
            params![note_id, user_id],
        )?;
        info!(note_id, "Note deleted");
        Ok(())
    }

    /// Search the user's cards by text, tags and decks
    ///
    /// Text matches anywhere in the note content. Tag and deck filters are
    /// ANDed with each other; IDs within one filter are ORed. Results are
    /// newest note first, capped at [`SEARCH_LIMIT`].
    pub fn search_cards(&self, user_id: i64, search: &CardSearch) -> Result<Vec<CardSearchResult>> {
        let conn = self.conn()?;
        let (where_clause, mut query_params) = search.build(user_id);
        query_params.push(Box::new(SEARCH_LIMIT));

        let sql = format!(
            r#"
            SELECT n.id, f.id, n.field_values, d.id, d.name, f.card_type, f.due_date
            FROM flashcards f
            JOIN notes n ON n.id = f.note_id
            JOIN decks d ON d.id = f.deck_id
            {}
            ORDER BY n.created_at DESC, n.id DESC, f.id ASC
            LIMIT ?
            "#,
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = query_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let raw: String = row.get(2)?;
                let card_type: String = row.get(5)?;
                let due: String = row.get(6)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    raw,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    card_type,
                    parse_date(&due)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(rows.len());
        for (note_id, flashcard_id, raw, deck_id, deck_name, card_type, due_date) in rows {
            let fields = NoteFields::decode(&raw);
            results.push(CardSearchResult {
                note_id,
                flashcard_id,
                front: fields.front,
                back: fields.back,
                deck_id,
                deck_name,
                card_type: card_type.parse().map_err(Error::Validation)?,
                due_date,
                tags: note_tag_names(&conn, note_id)?,
            });
        }

        Ok(results)
    }
}
