//! Study session loading

use chrono::NaiveDate;
use rand::Rng;
use rusqlite::params;
use tracing::debug;

use super::decks::ensure_deck_owner;
use super::settings::load_settings;
use super::{card_from_row, Database, CARD_COLUMNS};
use crate::error::Result;
use crate::models::Card;
use crate::study::select_session;

impl Database {
    /// Cards to study in a deck today, shuffled with `rng`
    pub fn get_study_session<R: Rng + ?Sized>(
        &self,
        user_id: i64,
        deck_id: i64,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        ensure_deck_owner(&conn, user_id, deck_id)?;
        let settings = load_settings(&conn, user_id, &self.study_defaults)?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM flashcards f
            JOIN notes n ON n.id = f.note_id
            WHERE f.deck_id = ? AND f.user_id = ?
              AND (f.card_type = 'new' OR f.due_date <= ?)
            "#,
            CARD_COLUMNS
        ))?;

        let candidates = stmt
            .query_map(params![deck_id, user_id, today.to_string()], card_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let session = select_session(candidates, &settings, today, rng);
        debug!(deck_id, cards = session.len(), "Study session built");
        Ok(session)
    }
}
