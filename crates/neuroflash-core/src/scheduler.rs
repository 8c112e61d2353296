//! Spaced-repetition review scheduler
//!
//! Computes a card's next memory state from its current state and a rating.
//! The transition is a pure function of `(state, rating, ease_bonus, today)`
//! so it can be tested without a database.
//!
//! | card type       | hard                         | good                        | easy                               |
//! |-----------------|------------------------------|-----------------------------|------------------------------------|
//! | new             | learning, 1d, lapses + 1     | learning, 1d                | review, 4d                         |
//! | learning        | learning, 1d, lapses + 1     | learning, round(i * 1.2)    | review, 1d                         |
//! | review          | learning, 1d, lapses + 1     | review, round(i * ease)     | review, round(i * ease * bonus)    |
//!
//! Hard always lowers ease by 0.2 and easy always raises it by 0.15. The easy
//! interval on a review card uses the ease from before the raise. Intervals
//! are floored at 1 day and ease is kept within [`MIN_EASE`, `MAX_EASE`].

use chrono::{Duration, NaiveDate};

use crate::models::{CardState, CardType, Rating};

/// Lowest ease factor a card can reach
pub const MIN_EASE: f64 = 1.3;

/// Safety ceiling on the ease factor
pub const MAX_EASE: f64 = 5.0;

/// Ease factor assigned to new cards
pub const DEFAULT_EASE: f64 = 2.5;

/// Default multiplier applied on easy reviews
pub const DEFAULT_EASE_BONUS: f64 = 1.3;

const HARD_EASE_PENALTY: f64 = 0.2;
const EASY_EASE_BONUS: f64 = 0.15;
const LEARNING_GOOD_MULTIPLIER: f64 = 1.2;
const NEW_EASY_INTERVAL: i64 = 4;

/// Result of scheduling a single review
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledState {
    pub state: CardState,
    /// Points awarded for this review
    pub points: i64,
}

/// Compute the state a card moves to after being rated
///
/// `reps` always increments. `last_reviewed` is carried over untouched; the
/// caller stamps it with the actual review time.
pub fn compute_next_state(
    card: &CardState,
    rating: Rating,
    ease_bonus: f64,
    today: NaiveDate,
) -> ScheduledState {
    let mut card_type = card.card_type;
    let mut ease = card.ease_factor;
    let mut lapses = card.lapses;
    let interval = card.interval_days as f64;

    let raw_interval = match (rating, card.card_type) {
        (Rating::Hard, _) => {
            lapses += 1;
            ease = (ease - HARD_EASE_PENALTY).max(MIN_EASE);
            card_type = CardType::Learning;
            1.0
        }
        (Rating::Good, CardType::New) => {
            card_type = CardType::Learning;
            1.0
        }
        (Rating::Good, CardType::Learning) => interval * LEARNING_GOOD_MULTIPLIER,
        (Rating::Good, CardType::Review) => interval * ease,
        (Rating::Easy, CardType::New) => {
            card_type = CardType::Review;
            ease += EASY_EASE_BONUS;
            NEW_EASY_INTERVAL as f64
        }
        (Rating::Easy, CardType::Learning) => {
            card_type = CardType::Review;
            ease += EASY_EASE_BONUS;
            1.0
        }
        (Rating::Easy, CardType::Review) => {
            let next = interval * ease * ease_bonus;
            ease += EASY_EASE_BONUS;
            next
        }
    };

    let interval_days = round_interval(raw_interval);
    let ease_factor = ease.clamp(MIN_EASE, MAX_EASE);

    ScheduledState {
        state: CardState {
            card_type,
            due_date: today + Duration::days(interval_days),
            ease_factor,
            interval_days,
            reps: card.reps + 1,
            lapses,
            last_reviewed: card.last_reviewed,
        },
        points: rating.points(),
    }
}

/// Round half away from zero, never below one day
fn round_interval(raw: f64) -> i64 {
    if !raw.is_finite() {
        return 1;
    }
    (raw.round() as i64).max(1)
}
