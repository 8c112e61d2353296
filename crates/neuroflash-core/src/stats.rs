//! Statistics helpers
//!
//! Pure aggregation used by the database layer: the trailing performance
//! window, review streaks, deck mastery and leaderboard ranking.

use chrono::{Duration, NaiveDate};

use crate::models::{DailyReviewStat, LeaderboardEntry};

/// Days before today covered by the performance window (inclusive of today,
/// so the window holds `PERFORMANCE_WINDOW_DAYS + 1` entries)
pub const PERFORMANCE_WINDOW_DAYS: i64 = 30;

/// Number of rows kept in the leaderboard snapshot
pub const SNAPSHOT_SIZE: usize = 1000;

/// Raw per-day aggregate as read from the review log
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub review_count: i64,
    pub average_rating: f64,
}

/// Expand sparse per-day aggregates into a dense, ascending window
/// from `today - PERFORMANCE_WINDOW_DAYS` through `today`
///
/// Days without reviews get a zero count and no average. Aggregates outside
/// the window are dropped.
pub fn performance_window(today: NaiveDate, rows: &[DailyAggregate]) -> Vec<DailyReviewStat> {
    let start = today - Duration::days(PERFORMANCE_WINDOW_DAYS);

    (0..=PERFORMANCE_WINDOW_DAYS)
        .map(|offset| {
            let date = start + Duration::days(offset);
            match rows.iter().find(|r| r.date == date) {
                Some(row) if row.review_count > 0 => DailyReviewStat {
                    date,
                    review_count: row.review_count,
                    average_rating: Some(round2(row.average_rating)),
                },
                _ => DailyReviewStat {
                    date,
                    review_count: 0,
                    average_rating: None,
                },
            }
        })
        .collect()
}

/// Streak length after a review on `today`
///
/// Reviewing again on the same day keeps the streak, reviewing the day after
/// the last review extends it, anything else restarts it at one.
pub fn next_streak(last_reviewed: Option<NaiveDate>, current: i64, today: NaiveDate) -> i64 {
    match last_reviewed {
        Some(last) if last == today => current.max(1),
        Some(last) if last + Duration::days(1) == today => current + 1,
        _ => 1,
    }
}

/// Streak as displayed on `today`: zero once a full day has been missed
pub fn current_streak(last_reviewed: Option<NaiveDate>, stored: i64, today: NaiveDate) -> i64 {
    match last_reviewed {
        Some(last) if last == today || last + Duration::days(1) == today => stored,
        _ => 0,
    }
}

/// Percentage of mastered cards, rounded to the nearest integer
pub fn mastered_percentage(mastered: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((mastered as f64 / total as f64) * 100.0).round() as i64
}

/// Rank users by points descending, ties broken by username ascending
///
/// Ranks are dense: equal points share a rank and the next distinct score
/// gets the next integer. Users with no points are excluded.
pub fn dense_rank(users: Vec<(i64, String, i64)>) -> Vec<LeaderboardEntry> {
    let mut users: Vec<_> = users.into_iter().filter(|(_, _, p)| *p > 0).collect();
    users.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)));

    let mut rank = 0;
    let mut previous: Option<i64> = None;
    users
        .into_iter()
        .map(|(user_id, username, points)| {
            if previous != Some(points) {
                rank += 1;
                previous = Some(points);
            }
            LeaderboardEntry {
                user_id,
                username,
                points,
                rank,
            }
        })
        .collect()
}

/// Total page count for `total` entries at `limit` per page
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_performance_window_is_dense_and_ascending() {
        let today = date(2024, 3, 31);
        let window = performance_window(today, &[]);

        assert_eq!(window.len(), 31);
        assert_eq!(window[0].date, date(2024, 3, 1));
        assert_eq!(window[30].date, today);
        assert!(window.windows(2).all(|w| w[0].date < w[1].date));
        assert!(window
            .iter()
            .all(|d| d.review_count == 0 && d.average_rating.is_none()));
    }

    #[test]
    fn test_performance_window_fills_known_days() {
        let today = date(2024, 1, 10);
        let rows = vec![
            DailyAggregate {
                date: date(2024, 1, 10),
                review_count: 3,
                average_rating: 2.0 / 3.0 + 1.0,
            },
            DailyAggregate {
                date: date(2023, 12, 11),
                review_count: 1,
                average_rating: 3.0,
            },
            // outside the window
            DailyAggregate {
                date: date(2023, 12, 10),
                review_count: 9,
                average_rating: 1.0,
            },
        ];
        let window = performance_window(today, &rows);

        assert_eq!(window.len(), 31);
        assert_eq!(window[0].date, date(2023, 12, 11));
        assert_eq!(window[0].review_count, 1);
        assert_eq!(window[0].average_rating, Some(3.0));
        assert_eq!(window[30].review_count, 3);
        assert_eq!(window[30].average_rating, Some(1.67));
        assert_eq!(window.iter().map(|d| d.review_count).sum::<i64>(), 4);
    }

    #[test]
    fn test_next_streak() {
        let today = date(2024, 2, 1);
        assert_eq!(next_streak(None, 0, today), 1);
        assert_eq!(next_streak(Some(today), 4, today), 4);
        assert_eq!(next_streak(Some(date(2024, 1, 31)), 4, today), 5);
        assert_eq!(next_streak(Some(date(2024, 1, 29)), 4, today), 1);
    }

    #[test]
    fn test_current_streak_expires_after_missed_day() {
        let today = date(2024, 2, 1);
        assert_eq!(current_streak(Some(today), 3, today), 3);
        assert_eq!(current_streak(Some(date(2024, 1, 31)), 3, today), 3);
        assert_eq!(current_streak(Some(date(2024, 1, 30)), 3, today), 0);
        assert_eq!(current_streak(None, 0, today), 0);
    }

    #[test]
    fn test_mastered_percentage() {
        assert_eq!(mastered_percentage(0, 0), 0);
        assert_eq!(mastered_percentage(1, 3), 33);
        assert_eq!(mastered_percentage(2, 3), 67);
        assert_eq!(mastered_percentage(5, 5), 100);
    }

    #[test]
    fn test_dense_rank_ties_share_rank() {
        let ranked = dense_rank(vec![
            (1, "carol".into(), 500),
            (2, "bob".into(), 700),
            (3, "alice".into(), 500),
            (4, "dave".into(), 0),
            (5, "erin".into(), 50),
        ]);

        let rows: Vec<(&str, i64)> = ranked.iter().map(|e| (e.username.as_str(), e.rank)).collect();
        assert_eq!(
            rows,
            vec![("bob", 1), ("alice", 2), ("carol", 2), ("erin", 3)]
        );
    }

    #[test]
    fn test_dense_rank_is_non_decreasing() {
        let users = (0..50).map(|i| (i, format!("u{:02}", i), (i % 7) * 100 + 1)).collect();
        let ranked = dense_rank(users);
        assert!(ranked.windows(2).all(|w| w[0].rank <= w[1].rank));
        assert!(ranked.windows(2).all(|w| w[0].points >= w[1].points));
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);
    }
}
