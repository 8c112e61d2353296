//! Per-user study settings

use rusqlite::{params, Connection, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::StudySettings;

pub(crate) fn load_settings(
    conn: &Connection,
    user_id: i64,
    defaults: &StudySettings,
) -> Result<StudySettings> {
    let settings = conn
        .query_row(
            r#"
            SELECT new_cards_per_day, max_reviews_per_day, learning_steps, ease_bonus
            FROM settings WHERE user_id = ?
            "#,
            params![user_id],
            |row| {
                Ok(StudySettings {
                    new_cards_per_day: row.get(0)?,
                    max_reviews_per_day: row.get(1)?,
                    learning_steps: row.get(2)?,
                    ease_bonus: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(settings.unwrap_or_else(|| defaults.clone()))
}

impl Database {
    /// Settings for a user, falling back to the configured defaults
    pub fn get_settings(&self, user_id: i64) -> Result<StudySettings> {
        let conn = self.conn()?;
        load_settings(&conn, user_id, &self.study_defaults)
    }

    /// Validate and save settings for a user
    pub fn save_settings(&self, user_id: i64, settings: &StudySettings) -> Result<()> {
        settings.validate()?;
        let conn = self.conn()?;
        Self::save_settings_tx(&conn, user_id, settings)
    }

    pub(crate) fn save_settings_tx(
        conn: &Connection,
        user_id: i64,
        settings: &StudySettings,
    ) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO settings (user_id, new_cards_per_day, max_reviews_per_day, learning_steps, ease_bonus)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                new_cards_per_day = excluded.new_cards_per_day,
                max_reviews_per_day = excluded.max_reviews_per_day,
                learning_steps = excluded.learning_steps,
                ease_bonus = excluded.ease_bonus
            "#,
            params![
                user_id,
                settings.new_cards_per_day,
                settings.max_reviews_per_day,
                settings.learning_steps,
                settings.ease_bonus,
            ],
        )?;
        Ok(())
    }
}
