//! Deck operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::tags::{clean_tag_names, deck_tag_names, get_or_create_tag, tag_deck, tag_note};
use super::{card_from_row, parse_datetime, Database, CARD_COLUMNS};
use crate::error::{Error, Result};
use crate::models::{Card, CardState, Deck, NewDeck, NoteFields, MASTERED_EASE};
use crate::stats::mastered_percentage;

/// Description given to decks assembled from the card browser
pub const CUSTOM_DECK_DESCRIPTION: &str = "Custom deck created from card browser.";

const DECK_SUMMARY_SELECT: &str = r#"
    SELECT d.id, d.user_id, d.name, d.description, d.created_at,
           COUNT(f.id),
           COALESCE(SUM(CASE WHEN f.card_type = 'review' AND f.ease_factor >= ?1 THEN 1 ELSE 0 END), 0)
    FROM decks d
    LEFT JOIN flashcards f ON f.deck_id = d.id
"#;

fn deck_from_row(row: &Row) -> rusqlite::Result<Deck> {
    let created_str: String = row.get(4)?;
    let card_count: i64 = row.get(5)?;
    let mastered: i64 = row.get(6)?;
    Ok(Deck {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        tags: Vec::new(),
        card_count,
        mastered_count: mastered,
        mastered_percentage: mastered_percentage(mastered, card_count),
        created_at: parse_datetime(&created_str),
    })
}

/// Insert a note and a fresh flashcard for it, returning the flashcard ID
pub(crate) fn insert_note_card(
    conn: &Connection,
    user_id: i64,
    deck_id: i64,
    fields: &NoteFields,
    tag_ids: &[i64],
    today: NaiveDate,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notes (user_id, note_type_id, field_values) VALUES (?, 1, ?)",
        params![user_id, fields.encode()?],
    )?;
    let note_id = conn.last_insert_rowid();

    for tag_id in tag_ids {
        tag_note(conn, note_id, *tag_id)?;
    }

    insert_card(conn, user_id, deck_id, note_id, today)
}

fn insert_card(
    conn: &Connection,
    user_id: i64,
    deck_id: i64,
    note_id: i64,
    today: NaiveDate,
) -> Result<i64> {
    let state = CardState::new_card(today);
    conn.execute(
        r#"
        INSERT INTO flashcards (note_id, deck_id, user_id, card_type, due_date, ease_factor,
                                interval_days, reps, lapses)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            note_id,
            deck_id,
            user_id,
            state.card_type.as_str(),
            state.due_date.to_string(),
            state.ease_factor,
            state.interval_days,
            state.reps,
            state.lapses,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fail with NotFound unless the deck exists and belongs to the user
pub(crate) fn ensure_deck_owner(conn: &Connection, user_id: i64, deck_id: i64) -> Result<()> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM decks WHERE id = ?",
            params![deck_id],
            |row| row.get(0),
        )
        .optional()?;
    match owner {
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(Error::AccessDenied(format!("Deck {} not found", deck_id))),
        None => Err(Error::NotFound(format!("Deck {} not found", deck_id))),
    }
}

impl Database {
    /// Create a deck with its tags and initial cards
    ///
    /// Tags are attached to the deck and to every note created with it.
    /// Cards with a blank side are skipped.
    pub fn create_deck(&self, user_id: i64, deck: &NewDeck, today: NaiveDate) -> Result<Deck> {
        let name = deck.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Deck name is required".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO decks (user_id, name, description) VALUES (?, ?, ?)",
            params![user_id, name, deck.description.as_deref().map(str::trim)],
        )?;
        let deck_id = tx.last_insert_rowid();

        let mut tag_ids = Vec::new();
        for tag in clean_tag_names(&deck.tags) {
            let tag_id = get_or_create_tag(&tx, &tag)?;
            tag_deck(&tx, deck_id, tag_id)?;
            tag_ids.push(tag_id);
        }

        let mut created = 0;
        for card in &deck.cards {
            let Ok(fields) = NoteFields::new(&card.front, &card.back) else {
                continue;
            };
            insert_note_card(&tx, user_id, deck_id, &fields, &tag_ids, today)?;
            created += 1;
        }

        tx.commit()?;

        info!(deck_id, cards = created, "Deck created");
        self.get_deck(user_id, deck_id)
    }

    /// Create a deck from existing notes the user owns
    ///
    /// Each note gets a fresh card in the new deck. Fails (and creates
    /// nothing) when none of the IDs resolve to the user's notes.
    pub fn create_custom_deck(
        &self,
        user_id: i64,
        name: &str,
        note_ids: &[i64],
        today: NaiveDate,
    ) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Deck name is required".to_string()));
        }
        if note_ids.is_empty() {
            return Err(Error::Validation("Select at least one card".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO decks (user_id, name, description) VALUES (?, ?, ?)",
            params![user_id, name, CUSTOM_DECK_DESCRIPTION],
        )?;
        let deck_id = tx.last_insert_rowid();

        let mut created = 0;
        {
            let mut stmt = tx.prepare("SELECT id FROM notes WHERE id = ? AND user_id = ?")?;
            let mut seen = std::collections::HashSet::new();
            for note_id in note_ids {
                if !seen.insert(*note_id) {
                    continue;
                }
                let owned: Option<i64> = stmt
                    .query_row(params![note_id, user_id], |row| row.get(0))
                    .optional()?;
                if let Some(note_id) = owned {
                    insert_card(&tx, user_id, deck_id, note_id, today)?;
                    created += 1;
                }
            }
        }

        if created == 0 {
            // Dropping the transaction rolls back the deck insert
            return Err(Error::Validation(
                "No valid cards were selected".to_string(),
            ));
        }

        tx.commit()?;

        info!(deck_id, cards = created, "Custom deck created");
        self.get_deck(user_id, deck_id)
    }

    /// Decks owned by the user, newest first, with progress
    pub fn list_decks(&self, user_id: i64) -> Result<Vec<Deck>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE d.user_id = ?2 GROUP BY d.id ORDER BY d.created_at DESC, d.id DESC",
            DECK_SUMMARY_SELECT
        ))?;

        let mut decks = stmt
            .query_map(params![MASTERED_EASE, user_id], deck_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for deck in &mut decks {
            deck.tags = deck_tag_names(&conn, deck.id)?;
        }

        Ok(decks)
    }

    /// A single deck the user owns
    pub fn get_deck(&self, user_id: i64, deck_id: i64) -> Result<Deck> {
        let conn = self.conn()?;
        ensure_deck_owner(&conn, user_id, deck_id)?;

        let mut deck = conn.query_row(
            &format!("{} WHERE d.id = ?2 GROUP BY d.id", DECK_SUMMARY_SELECT),
            params![MASTERED_EASE, deck_id],
            deck_from_row,
        )?;
        deck.tags = deck_tag_names(&conn, deck_id)?;
        Ok(deck)
    }

    /// Delete a deck, its cards, and notes left without any card
    pub fn delete_deck(&self, user_id: i64, deck_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_deck_owner(&tx, user_id, deck_id)?;

        let note_ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT DISTINCT note_id FROM flashcards WHERE deck_id = ?")?;
            let ids = stmt
                .query_map(params![deck_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };

        tx.execute("DELETE FROM decks WHERE id = ?", params![deck_id])?;

        for note_id in note_ids {
            tx.execute(
                r#"
                DELETE FROM notes
                WHERE id = ? AND NOT EXISTS (SELECT 1 FROM flashcards WHERE note_id = notes.id)
                "#,
                params![note_id],
            )?;
        }

        tx.commit()?;
        info!(deck_id, "Deck deleted");
        Ok(())
    }

    /// All cards in a deck, oldest first
    pub fn list_deck_cards(&self, user_id: i64, deck_id: i64) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        ensure_deck_owner(&conn, user_id, deck_id)?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM flashcards f
            JOIN notes n ON n.id = f.note_id
            WHERE f.deck_id = ?
            ORDER BY f.created_at ASC, f.id ASC
            "#,
            CARD_COLUMNS
        ))?;

        let cards = stmt
            .query_map(params![deck_id], card_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    /// Add a single card to a deck, inheriting the deck's tags
    pub fn add_card(
        &self,
        user_id: i64,
        deck_id: i64,
        front: &str,
        back: &str,
        today: NaiveDate,
    ) -> Result<Card> {
        let fields = NoteFields::new(front, back)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_deck_owner(&tx, user_id, deck_id)?;

        let tag_ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT tag_id FROM deck_tags WHERE deck_id = ?")?;
            let ids = stmt
                .query_map(params![deck_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };

        let card_id = insert_note_card(&tx, user_id, deck_id, &fields, &tag_ids, today)?;
        tx.commit()?;

        self.get_card(user_id, card_id)
    }

    /// A single card the user owns
    pub fn get_card(&self, user_id: i64, card_id: i64) -> Result<Card> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                r#"
                SELECT {} FROM flashcards f
                JOIN notes n ON n.id = f.note_id
                WHERE f.id = ? AND f.user_id = ?
                "#,
                CARD_COLUMNS
            ),
            params![card_id, user_id],
            card_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Flashcard {} not found", card_id)))
    }
}
