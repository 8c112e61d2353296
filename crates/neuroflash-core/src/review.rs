//! Review submission
//!
//! A review touches four records: the card's memory state, the review log,
//! the user's stats and (indirectly) the leaderboard. [`submit_review`]
//! drives those writes through a [`ReviewStore`] so the sequencing can be
//! tested against an in-memory store. The SQLite store runs the whole call
//! inside one transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{CardState, NewReviewLog, Rating, StudySettings, UserStats};
use crate::scheduler::compute_next_state;

/// Storage operations needed to record a review
pub trait ReviewStore {
    /// Load a card's state if it exists and belongs to `user_id`
    fn load_card(&self, card_id: i64, user_id: i64) -> Result<Option<CardState>>;

    fn load_settings(&self, user_id: i64) -> Result<StudySettings>;

    fn save_card(&self, card_id: i64, state: &CardState) -> Result<()>;

    /// Append a log entry, returning its id
    fn append_review_log(&self, entry: &NewReviewLog) -> Result<i64>;

    /// Add points, bump the review count and streak, returning the new stats
    fn upsert_user_stats(
        &self,
        user_id: i64,
        points: i64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<UserStats>;
}

/// Outcome of a recorded review
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub flashcard_id: i64,
    pub review_log_id: i64,
    pub points_earned: i64,
    pub new_state: CardState,
    pub stats: UserStats,
}

impl ReviewOutcome {
    pub fn message(&self) -> String {
        format!("Review recorded. You earned {} points!", self.points_earned)
    }
}

/// Record a review of `card_id` by `user_id`
///
/// Fails with `NotFound` when the card is missing or owned by another user,
/// before anything is written.
pub fn submit_review<S: ReviewStore + ?Sized>(
    store: &S,
    user_id: i64,
    card_id: i64,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome> {
    let current = store
        .load_card(card_id, user_id)?
        .ok_or_else(|| Error::NotFound(format!("Flashcard {} not found", card_id)))?;
    let settings = store.load_settings(user_id)?;

    let scheduled = compute_next_state(&current, rating, settings.ease_bonus, now.date_naive());
    let mut new_state = scheduled.state;
    new_state.last_reviewed = Some(now);

    store.save_card(card_id, &new_state)?;

    let review_log_id = store.append_review_log(&NewReviewLog {
        flashcard_id: card_id,
        user_id,
        rating,
        review_time: now,
        interval_before: current.interval_days,
        interval_after: new_state.interval_days,
        ease_factor_before: current.ease_factor,
        ease_factor_after: new_state.ease_factor,
    })?;

    let stats = store.upsert_user_stats(user_id, scheduled.points, now)?;

    debug!(
        card_id,
        user_id,
        rating = rating.as_str(),
        interval = new_state.interval_days,
        "Review recorded"
    );

    Ok(ReviewOutcome {
        flashcard_id: card_id,
        review_log_id,
        points_earned: scheduled.points,
        new_state,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardType;
    use crate::stats::next_streak;
    use chrono::{NaiveDate, TimeZone};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        cards: RefCell<HashMap<i64, (i64, CardState)>>,
        logs: RefCell<Vec<NewReviewLog>>,
        stats: RefCell<HashMap<i64, UserStats>>,
        settings: StudySettings,
        writes: RefCell<usize>,
    }

    impl MemoryStore {
        fn with_card(card_id: i64, owner: i64, state: CardState) -> Self {
            let store = Self::default();
            store.cards.borrow_mut().insert(card_id, (owner, state));
            store
        }
    }

    impl ReviewStore for MemoryStore {
        fn load_card(&self, card_id: i64, user_id: i64) -> Result<Option<CardState>> {
            Ok(self
                .cards
                .borrow()
                .get(&card_id)
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, s)| s.clone()))
        }

        fn load_settings(&self, _user_id: i64) -> Result<StudySettings> {
            Ok(self.settings.clone())
        }

        fn save_card(&self, card_id: i64, state: &CardState) -> Result<()> {
            *self.writes.borrow_mut() += 1;
            if let Some(entry) = self.cards.borrow_mut().get_mut(&card_id) {
                entry.1 = state.clone();
            }
            Ok(())
        }

        fn append_review_log(&self, entry: &NewReviewLog) -> Result<i64> {
            *self.writes.borrow_mut() += 1;
            let mut logs = self.logs.borrow_mut();
            logs.push(entry.clone());
            Ok(logs.len() as i64)
        }

        fn upsert_user_stats(
            &self,
            user_id: i64,
            points: i64,
            reviewed_at: DateTime<Utc>,
        ) -> Result<UserStats> {
            *self.writes.borrow_mut() += 1;
            let today = reviewed_at.date_naive();
            let mut stats = self.stats.borrow_mut();
            let entry = stats.entry(user_id).or_insert_with(|| UserStats {
                user_id,
                ..Default::default()
            });
            entry.points += points;
            entry.total_reviews += 1;
            entry.review_streak_days =
                next_streak(entry.last_reviewed_date, entry.review_streak_days, today);
            entry.last_reviewed_date = Some(today);
            Ok(entry.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_submit_review_updates_card_log_and_stats() {
        let today = now().date_naive();
        let store = MemoryStore::with_card(7, 1, CardState::new_card(today));

        let outcome = submit_review(&store, 1, 7, Rating::Easy, now()).unwrap();

        assert_eq!(outcome.points_earned, 500);
        assert_eq!(outcome.new_state.card_type, CardType::Review);
        assert_eq!(outcome.new_state.last_reviewed, Some(now()));
        assert_eq!(outcome.message(), "Review recorded. You earned 500 points!");

        let logs = store.logs.borrow();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].interval_before, 0);
        assert_eq!(logs[0].interval_after, 4);
        assert_eq!(logs[0].ease_factor_before, 2.5);
        assert_eq!(logs[0].rating, Rating::Easy);

        let saved = store.cards.borrow()[&7].1.clone();
        assert_eq!(saved, outcome.new_state);

        assert_eq!(outcome.stats.points, 500);
        assert_eq!(outcome.stats.total_reviews, 1);
        assert_eq!(outcome.stats.last_reviewed_date, Some(today));
        assert_eq!(outcome.stats.review_streak_days, 1);
    }

    #[test]
    fn test_submit_review_other_users_card_is_not_found() {
        let store = MemoryStore::with_card(7, 1, CardState::new_card(now().date_naive()));

        let err = submit_review(&store, 2, 7, Rating::Good, now()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(*store.writes.borrow(), 0);
    }

    #[test]
    fn test_submit_review_missing_card_writes_nothing() {
        let store = MemoryStore::default();
        let err = submit_review(&store, 1, 99, Rating::Hard, now()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(*store.writes.borrow(), 0);
        assert!(store.logs.borrow().is_empty());
    }

    #[test]
    fn test_points_accumulate_across_reviews() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let store = MemoryStore::with_card(1, 1, CardState::new_card(today));

        submit_review(&store, 1, 1, Rating::Good, now()).unwrap();
        submit_review(&store, 1, 1, Rating::Hard, now()).unwrap();
        let last = submit_review(&store, 1, 1, Rating::Easy, now()).unwrap();

        assert_eq!(last.stats.points, 200 + 50 + 500);
        assert_eq!(last.stats.total_reviews, 3);
        assert_eq!(last.new_state.reps, 3);
        assert_eq!(store.logs.borrow().len(), 3);
    }

    #[test]
    fn test_ease_bonus_comes_from_settings() {
        let today = now().date_naive();
        let mut state = CardState::new_card(today);
        state.card_type = CardType::Review;
        state.interval_days = 10;
        state.ease_factor = 2.0;

        let mut store = MemoryStore::with_card(3, 1, state);
        store.settings.ease_bonus = 2.0;

        let outcome = submit_review(&store, 1, 3, Rating::Easy, now()).unwrap();
        assert_eq!(outcome.new_state.interval_days, 40);
    }
}
