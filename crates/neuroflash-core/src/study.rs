//! Study session selection
//!
//! A session mixes the newest unseen cards with the most overdue review
//! cards, capped by the user's daily limits, then shuffled.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{Card, CardType, StudySettings};

/// Build a study session from the candidate cards of a deck
///
/// - new cards: newest first (`created_at` descending), at most `new_cards_per_day`
/// - due cards: non-new cards with `due_date <= today`, ordered by due date then
///   ease (hardest first), at most `max_reviews_per_day`
///
/// Cards that are neither new nor due are ignored. The combined list is
/// shuffled with `rng`.
pub fn select_session<R: Rng + ?Sized>(
    candidates: Vec<Card>,
    settings: &StudySettings,
    today: NaiveDate,
    rng: &mut R,
) -> Vec<Card> {
    let (mut new_cards, rest): (Vec<Card>, Vec<Card>) = candidates
        .into_iter()
        .partition(|c| c.state.card_type == CardType::New);

    let mut due_cards: Vec<Card> = rest
        .into_iter()
        .filter(|c| c.state.due_date <= today)
        .collect();

    new_cards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    new_cards.truncate(cap(settings.new_cards_per_day));

    due_cards.sort_by(|a, b| {
        a.state
            .due_date
            .cmp(&b.state.due_date)
            .then(a.state.ease_factor.total_cmp(&b.state.ease_factor))
            .then(a.id.cmp(&b.id))
    });
    due_cards.truncate(cap(settings.max_reviews_per_day));

    let mut session = new_cards;
    session.append(&mut due_cards);
    session.shuffle(rng);
    session
}

fn cap(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardState;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn created(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn new_card(id: i64, minutes: i64) -> Card {
        Card {
            id,
            note_id: id,
            deck_id: 1,
            front: format!("q{}", id),
            back: format!("a{}", id),
            state: CardState::new_card(today()),
            created_at: created(minutes),
        }
    }

    fn review_card(id: i64, due_offset: i64, ease: f64) -> Card {
        let mut card = new_card(id, 0);
        card.state.card_type = CardType::Review;
        card.state.due_date = today() + Duration::days(due_offset);
        card.state.ease_factor = ease;
        card.state.interval_days = 5;
        card
    }

    fn ids(cards: &[Card]) -> HashSet<i64> {
        cards.iter().map(|c| c.id).collect()
    }

    fn settings(new: i64, reviews: i64) -> StudySettings {
        StudySettings {
            new_cards_per_day: new,
            max_reviews_per_day: reviews,
            ..Default::default()
        }
    }

    #[test]
    fn test_caps_limit_each_kind() {
        let mut cards: Vec<Card> = (1..=30).map(|i| new_card(i, i)).collect();
        cards.extend((100..150).map(|i| review_card(i, -1, 2.5)));

        let mut rng = StdRng::seed_from_u64(7);
        let session = select_session(cards, &settings(5, 10), today(), &mut rng);

        let new_count = session
            .iter()
            .filter(|c| c.state.card_type == CardType::New)
            .count();
        assert_eq!(new_count, 5);
        assert_eq!(session.len(), 15);
    }

    #[test]
    fn test_newest_new_cards_are_chosen() {
        let cards: Vec<Card> = (1..=10).map(|i| new_card(i, i)).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let session = select_session(cards, &settings(3, 10), today(), &mut rng);
        assert_eq!(ids(&session), HashSet::from([8, 9, 10]));
    }

    #[test]
    fn test_most_overdue_and_hardest_reviews_first() {
        let cards = vec![
            review_card(1, -10, 2.5),
            review_card(2, -1, 2.5),
            review_card(3, -10, 1.5),
            review_card(4, -5, 2.5),
            review_card(5, 0, 2.5),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let session = select_session(cards, &settings(0, 3), today(), &mut rng);
        assert_eq!(ids(&session), HashSet::from([1, 3, 4]));
    }

    #[test]
    fn test_future_cards_are_excluded() {
        let cards = vec![
            review_card(1, 1, 2.5),
            review_card(2, 30, 2.5),
            review_card(3, 0, 2.5),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        let session = select_session(cards, &settings(20, 100), today(), &mut rng);
        assert_eq!(ids(&session), HashSet::from([3]));
    }

    #[test]
    fn test_learning_cards_count_as_due() {
        let mut card = review_card(1, 0, 2.3);
        card.state.card_type = CardType::Learning;
        let mut rng = StdRng::seed_from_u64(11);
        let session = select_session(vec![card], &settings(0, 5), today(), &mut rng);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_zero_caps_give_empty_session() {
        let cards = vec![new_card(1, 1), review_card(2, -1, 2.5)];
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_session(cards, &settings(0, 0), today(), &mut rng).is_empty());
    }

    #[test]
    fn test_empty_deck_gives_empty_session() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_session(Vec::new(), &settings(20, 100), today(), &mut rng).is_empty());
    }

    #[test]
    fn test_shuffle_is_deterministic_for_a_seed() {
        let make = || -> Vec<Card> { (1..=20).map(|i| new_card(i, i)).collect() };
        let a = select_session(make(), &settings(20, 0), today(), &mut StdRng::seed_from_u64(42));
        let b = select_session(make(), &settings(20, 0), today(), &mut StdRng::seed_from_u64(42));
        let order_a: Vec<i64> = a.iter().map(|c| c.id).collect();
        let order_b: Vec<i64> = b.iter().map(|c| c.id).collect();
        assert_eq!(order_a, order_b);
        assert_eq!(ids(&a), ids(&make()));
    }
}
