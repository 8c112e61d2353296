//! Transactional review store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use super::settings::load_settings;
use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{CardState, NewReviewLog, Rating, ReviewLogEntry, StudySettings, UserStats};
use crate::review::{submit_review, ReviewOutcome, ReviewStore};
use crate::stats::next_streak;

/// [`ReviewStore`] over a single SQLite connection
///
/// Pass an open transaction to make a review all-or-nothing.
pub struct SqliteReviewStore<'a> {
    conn: &'a Connection,
    defaults: &'a StudySettings,
}

impl<'a> SqliteReviewStore<'a> {
    pub fn new(conn: &'a Connection, defaults: &'a StudySettings) -> Self {
        Self { conn, defaults }
    }
}

pub(crate) fn load_user_stats(conn: &Connection, user_id: i64) -> Result<UserStats> {
    let stats = conn
        .query_row(
            r#"
            SELECT points, total_reviews, last_reviewed_date, review_streak_days
            FROM user_stats WHERE user_id = ?
            "#,
            params![user_id],
            |row| {
                let last: Option<String> = row.get(2)?;
                Ok(UserStats {
                    user_id,
                    points: row.get(0)?,
                    total_reviews: row.get(1)?,
                    last_reviewed_date: last.as_deref().map(parse_date).transpose()?,
                    review_streak_days: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(stats.unwrap_or(UserStats {
        user_id,
        ..Default::default()
    }))
}

impl ReviewStore for SqliteReviewStore<'_> {
    fn load_card(&self, card_id: i64, user_id: i64) -> Result<Option<CardState>> {
        let state = self
            .conn
            .query_row(
                r#"
                SELECT card_type, due_date, ease_factor, interval_days, reps, lapses, last_reviewed
                FROM flashcards
                WHERE id = ? AND user_id = ?
                "#,
                params![card_id, user_id],
                |row| {
                    let card_type: String = row.get(0)?;
                    let due: String = row.get(1)?;
                    let last: Option<String> = row.get(6)?;
                    Ok((
                        card_type,
                        due,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        last,
                    ))
                },
            )
            .optional()?;

        match state {
            Some((card_type, due, ease_factor, interval_days, reps, lapses, last)) => {
                Ok(Some(CardState {
                    card_type: card_type.parse().map_err(Error::Validation)?,
                    due_date: parse_date(&due)?,
                    ease_factor,
                    interval_days,
                    reps,
                    lapses,
                    last_reviewed: last.as_deref().map(parse_datetime),
                }))
            }
            None => Ok(None),
        }
    }

    fn load_settings(&self, user_id: i64) -> Result<StudySettings> {
        load_settings(self.conn, user_id, self.defaults)
    }

    fn save_card(&self, card_id: i64, state: &CardState) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE flashcards
            SET card_type = ?, due_date = ?, ease_factor = ?, interval_days = ?,
                reps = ?, lapses = ?, last_reviewed = ?
            WHERE id = ?
            "#,
            params![
                state.card_type.as_str(),
                state.due_date.to_string(),
                state.ease_factor,
                state.interval_days,
                state.reps,
                state.lapses,
                state.last_reviewed.as_ref().map(format_datetime),
                card_id,
            ],
        )?;
        Ok(())
    }

    fn append_review_log(&self, entry: &NewReviewLog) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO review_logs (flashcard_id, user_id, rating, review_time,
                                     interval_before, interval_after,
                                     ease_factor_before, ease_factor_after)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.flashcard_id,
                entry.user_id,
                entry.rating.ordinal(),
                format_datetime(&entry.review_time),
                entry.interval_before,
                entry.interval_after,
                entry.ease_factor_before,
                entry.ease_factor_after,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn upsert_user_stats(
        &self,
        user_id: i64,
        points: i64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<UserStats> {
        let today = reviewed_at.date_naive();
        let current = load_user_stats(self.conn, user_id)?;
        let streak = next_streak(current.last_reviewed_date, current.review_streak_days, today);

        self.conn.execute(
            r#"
            INSERT INTO user_stats (user_id, points, total_reviews, last_reviewed_date, review_streak_days)
            VALUES (?1, ?2, 1, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                points = points + ?2,
                total_reviews = total_reviews + 1,
                last_reviewed_date = ?3,
                review_streak_days = ?4
            "#,
            params![user_id, points, today.to_string(), streak],
        )?;

        load_user_stats(self.conn, user_id)
    }
}

impl Database {
    /// Record a review atomically
    ///
    /// The rating is validated before the database is touched. Card update,
    /// log append and stats upsert commit together or not at all.
    pub fn record_review(
        &self,
        user_id: i64,
        card_id: i64,
        rating: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let rating = Rating::parse(rating)?;

        // Write lock up front; concurrent reviews wait on busy_timeout
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = {
            let store = SqliteReviewStore::new(&tx, &self.study_defaults);
            submit_review(&store, user_id, card_id, rating, now)?
        };
        tx.commit()?;

        info!(
            card_id,
            user_id,
            points = outcome.points_earned,
            "Review committed"
        );
        Ok(outcome)
    }

    /// Cumulative stats for a user (zeroes if they never reviewed)
    pub fn get_user_stats(&self, user_id: i64) -> Result<UserStats> {
        let conn = self.conn()?;
        load_user_stats(&conn, user_id)
    }

    /// Review history of one card, oldest first
    pub fn list_review_logs(&self, user_id: i64, card_id: i64) -> Result<Vec<ReviewLogEntry>> {
        // Ownership check
        self.get_card(user_id, card_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, flashcard_id, user_id, rating, review_time, interval_before,
                   interval_after, ease_factor_before, ease_factor_after
            FROM review_logs
            WHERE flashcard_id = ? AND user_id = ?
            ORDER BY review_time ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![card_id, user_id], |row| {
                let rating: i64 = row.get(3)?;
                let time: String = row.get(4)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    rating,
                    time,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, f64>(7)?,
                    row.get::<_, f64>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, flashcard_id, user_id, rating, time, ib, ia, eb, ea)| {
                Ok(ReviewLogEntry {
                    id,
                    flashcard_id,
                    user_id,
                    rating: Rating::from_ordinal(rating).ok_or_else(|| {
                        Error::Validation(format!("Invalid stored rating: {}", rating))
                    })?,
                    review_time: parse_datetime(&time),
                    interval_before: ib,
                    interval_after: ia,
                    ease_factor_before: eb,
                    ease_factor_after: ea,
                })
            })
            .collect()
    }
}
