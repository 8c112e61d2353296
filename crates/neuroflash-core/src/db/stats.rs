//! Dashboard, performance, activity and leaderboard queries

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use super::reviews::load_user_stats;
use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    ActivityItem, DailyReviewStat, DashboardStats, LeaderboardEntry, LeaderboardPage,
    LeaderboardSnapshotEntry, Pagination, Rating, SnapshotRefreshResult, MASTERED_EASE,
};
use crate::stats::{
    current_streak, dense_rank, performance_window, total_pages, DailyAggregate,
    PERFORMANCE_WINDOW_DAYS, SNAPSHOT_SIZE,
};

/// Default page size for the live leaderboard
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 50;

/// Largest accepted leaderboard page size
pub const MAX_LEADERBOARD_LIMIT: i64 = 1000;

/// Number of items in the recent activity feed
pub const ACTIVITY_LIMIT: i64 = 10;

fn ranked_users(conn: &Connection) -> Result<Vec<LeaderboardEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT u.id, u.username, s.points
        FROM user_stats s
        JOIN users u ON u.id = s.user_id
        WHERE s.points > 0
        "#,
    )?;
    let users = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<(i64, String, i64)>, _>>()?;
    Ok(dense_rank(users))
}

impl Database {
    /// Dashboard summary
    pub fn get_dashboard(&self, user_id: i64, today: NaiveDate) -> Result<DashboardStats> {
        let conn = self.conn()?;

        let total_decks: i64 = conn.query_row(
            "SELECT COUNT(*) FROM decks WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;

        let cards_mastered: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM flashcards
            WHERE user_id = ? AND card_type = 'review' AND ease_factor >= ?
            "#,
            params![user_id, MASTERED_EASE],
            |row| row.get(0),
        )?;

        let stats = load_user_stats(&conn, user_id)?;

        Ok(DashboardStats {
            total_decks,
            cards_mastered,
            points: stats.points,
            review_streak_days: current_streak(
                stats.last_reviewed_date,
                stats.review_streak_days,
                today,
            ),
        })
    }

    /// Reviews per day over the trailing window ending today
    pub fn get_performance(&self, user_id: i64, today: NaiveDate) -> Result<Vec<DailyReviewStat>> {
        let conn = self.conn()?;
        let start = today - Duration::days(PERFORMANCE_WINDOW_DAYS);

        let mut stmt = conn.prepare(
            r#"
            SELECT DATE(review_time) AS day, COUNT(*), AVG(rating)
            FROM review_logs
            WHERE user_id = ? AND DATE(review_time) BETWEEN ? AND ?
            GROUP BY day
            ORDER BY day
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![user_id, start.to_string(), today.to_string()],
                |row| {
                    let day: String = row.get(0)?;
                    Ok(DailyAggregate {
                        date: parse_date(&day)?,
                        review_count: row.get(1)?,
                        average_rating: row.get(2)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(performance_window(today, &rows))
    }

    /// Most recent reviews, newest first
    pub fn get_recent_activity(&self, user_id: i64) -> Result<Vec<ActivityItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.id, r.flashcard_id, d.name, r.rating, r.review_time
            FROM review_logs r
            JOIN flashcards f ON f.id = r.flashcard_id
            JOIN decks d ON d.id = f.deck_id
            WHERE r.user_id = ?
            ORDER BY r.review_time DESC, r.id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id, ACTIVITY_LIMIT], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(review_id, flashcard_id, deck_name, rating, time)| {
                let rating = Rating::from_ordinal(rating).ok_or_else(|| {
                    Error::Validation(format!("Invalid stored rating: {}", rating))
                })?;
                Ok(ActivityItem {
                    review_id,
                    flashcard_id,
                    description: format!(
                        "Rated '{}' on a card in '{}'",
                        rating.label(),
                        deck_name
                    ),
                    deck_name,
                    rating,
                    review_time: parse_datetime(&time),
                })
            })
            .collect()
    }

    /// One page of the live leaderboard plus the caller's own rank
    ///
    /// `page` is 1-based and a page past the end falls back to the last one.
    /// `limit` is clamped to [1, 1000].
    pub fn get_leaderboard(&self, user_id: i64, page: i64, limit: i64) -> Result<LeaderboardPage> {
        let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT);

        let conn = self.conn()?;
        let ranked = ranked_users(&conn)?;
        let total_entries = ranked.len() as i64;
        let pages = total_pages(total_entries, limit);
        let page = page.clamp(1, pages.max(1));

        let current_user_rank = ranked.iter().find(|e| e.user_id == user_id).cloned();

        let offset = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let leaderboard = ranked
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(LeaderboardPage {
            leaderboard,
            current_user_rank,
            pagination: Pagination {
                page,
                limit,
                total_entries,
                total_pages: pages,
            },
        })
    }

    /// Rebuild the leaderboard snapshot from current points
    ///
    /// Replaces every row in one transaction. Concurrent refreshes are
    /// serialized; readers see either the old or the new snapshot.
    pub fn refresh_leaderboard_snapshot(&self, now: DateTime<Utc>) -> Result<SnapshotRefreshResult> {
        let _guard = self
            .snapshot_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let ranked = ranked_users(&tx)?;
        let captured = format_datetime(&now);

        tx.execute("DELETE FROM leaderboard_snapshots", [])?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO leaderboard_snapshots (rank, user_id, username, points, captured_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )?;
            for entry in ranked.iter().take(SNAPSHOT_SIZE) {
                stmt.execute(params![
                    entry.rank,
                    entry.user_id,
                    entry.username,
                    entry.points,
                    captured
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;

        info!(entries = inserted, "Leaderboard snapshot refreshed");
        Ok(SnapshotRefreshResult {
            entries: inserted,
            captured_at: now,
        })
    }

    /// Rows of the last leaderboard snapshot, best first
    pub fn get_leaderboard_snapshot(&self, limit: i64) -> Result<Vec<LeaderboardSnapshotEntry>> {
        let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT rank, user_id, username, points, captured_at
            FROM leaderboard_snapshots
            ORDER BY rank ASC, username ASC
            LIMIT ?
            "#,
        )?;

        let entries = stmt
            .query_map(params![limit], |row| {
                let captured: String = row.get(4)?;
                Ok(LeaderboardSnapshotEntry {
                    entry: LeaderboardEntry {
                        rank: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        points: row.get(3)?,
                    },
                    captured_at: parse_datetime(&captured),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
