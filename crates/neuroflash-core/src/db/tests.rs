//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rusqlite::params;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 20).unwrap()
    }

    fn at(day: NaiveDate, hour: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap())
    }

    fn create_user(db: &Database, name: &str) -> User {
        db.create_user(&NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "correct horse".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn cards(pairs: &[(&str, &str)]) -> Vec<NewCardContent> {
        pairs
            .iter()
            .map(|(f, b)| NewCardContent {
                front: f.to_string(),
                back: b.to_string(),
            })
            .collect()
    }

    fn create_deck(db: &Database, user: &User, name: &str, pairs: &[(&str, &str)]) -> Deck {
        db.create_deck(
            user.id,
            &NewDeck {
                name: name.to_string(),
                description: None,
                tags: vec![],
                cards: cards(pairs),
            },
            today(),
        )
        .unwrap()
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn().unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users"), 0);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM note_types WHERE name = 'Basic'"),
            1
        );
    }

    #[test]
    fn test_create_user_and_duplicate_email() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        assert_eq!(alice.username, "alice");

        let err = db
            .create_user(&NewUser {
                username: "other".to_string(),
                email: "ALICE@example.com".to_string(),
                password: "pw".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_create_user_requires_fields() {
        let db = Database::in_memory().unwrap();
        let err = db
            .create_user(&NewUser {
                username: "bob".to_string(),
                email: "not-an-email".to_string(),
                password: "pw".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_authenticate() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");

        let user = db.authenticate("alice@example.com", "correct horse").unwrap();
        assert_eq!(user.id, alice.id);

        assert!(matches!(
            db.authenticate("alice@example.com", "wrong"),
            Err(Error::Auth(_))
        ));
        assert!(matches!(
            db.authenticate("nobody@example.com", "correct horse"),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_token_lifecycle() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");

        let token = db.issue_token(alice.id).unwrap();
        assert_eq!(token.len(), 64);

        // Stored as a digest, never in plaintext
        let stored: String = db
            .conn()
            .unwrap()
            .query_row("SELECT token_hash FROM api_tokens", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, token);

        let resolved = db.user_for_token(&token).unwrap().unwrap();
        assert_eq!(resolved.id, alice.id);

        assert!(db.revoke_token(&token).unwrap());
        assert!(db.user_for_token(&token).unwrap().is_none());
        assert!(!db.revoke_token(&token).unwrap());
    }

    #[test]
    fn test_settings_default_and_save() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");

        assert_eq!(db.get_settings(alice.id).unwrap(), StudySettings::default());

        let custom = StudySettings {
            new_cards_per_day: 5,
            max_reviews_per_day: 40,
            learning_steps: "1,5,15".to_string(),
            ease_bonus: 1.5,
        };
        db.save_settings(alice.id, &custom).unwrap();
        assert_eq!(db.get_settings(alice.id).unwrap(), custom);

        let invalid = StudySettings {
            ease_bonus: -1.0,
            ..custom.clone()
        };
        assert!(matches!(
            db.save_settings(alice.id, &invalid),
            Err(Error::Validation(_))
        ));
        assert_eq!(db.get_settings(alice.id).unwrap(), custom);
    }

    #[test]
    fn test_configured_study_defaults() {
        let db = Database::in_memory()
            .unwrap()
            .with_study_defaults(StudySettings {
                new_cards_per_day: 3,
                ..Default::default()
            });
        let alice = create_user(&db, "alice");
        assert_eq!(db.get_settings(alice.id).unwrap().new_cards_per_day, 3);
    }

    #[test]
    fn test_update_profile() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        create_user(&db, "bob");

        let profile = db
            .update_profile(
                alice.id,
                &ProfileUpdate {
                    username: Some("Alice A.".to_string()),
                    email: None,
                    settings: SettingsUpdate {
                        new_cards_per_day: Some(7),
                        ..Default::default()
                    },
                },
            )
            .unwrap();
        assert_eq!(profile.user.username, "Alice A.");
        assert_eq!(profile.settings.new_cards_per_day, 7);
        assert_eq!(profile.settings.max_reviews_per_day, 100);

        let err = db
            .update_profile(
                alice.id,
                &ProfileUpdate {
                    email: Some("bob@example.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = db
            .update_profile(
                alice.id,
                &ProfileUpdate {
                    username: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_create_deck_with_tags_skips_blank_cards() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");

        let deck = db
            .create_deck(
                alice.id,
                &NewDeck {
                    name: "Spanish".to_string(),
                    description: Some("Basics".to_string()),
                    tags: vec!["Language".to_string(), "language".to_string(), "A1".to_string()],
                    cards: cards(&[("hola", "hello"), ("", "orphan"), ("adiós", "bye")]),
                },
                today(),
            )
            .unwrap();

        assert_eq!(deck.name, "Spanish");
        assert_eq!(deck.card_count, 2);
        assert_eq!(deck.mastered_count, 0);
        assert_eq!(deck.tags, vec!["A1", "Language"]);

        // Deck tags are copied onto each note
        assert_eq!(count(&db, "SELECT COUNT(*) FROM note_tags"), 4);

        let deck_cards = db.list_deck_cards(alice.id, deck.id).unwrap();
        assert_eq!(deck_cards.len(), 2);
        for card in &deck_cards {
            assert_eq!(card.state.card_type, CardType::New);
            assert_eq!(card.state.due_date, today());
            assert_eq!(card.state.ease_factor, 2.5);
            assert_eq!(card.state.interval_days, 0);
            assert_eq!(card.state.reps, 0);
        }

        let tags = db.list_tags_for_user(alice.id).unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A1", "Language"]);
    }

    #[test]
    fn test_create_deck_requires_name() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let err = db
            .create_deck(alice.id, &NewDeck::default(), today())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM decks"), 0);
    }

    #[test]
    fn test_decks_are_private() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let deck = create_deck(&db, &alice, "Mine", &[("q", "a")]);

        assert!(db.list_decks(bob.id).unwrap().is_empty());
        assert!(matches!(
            db.get_deck(bob.id, deck.id),
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(
            db.get_deck(alice.id, 9999),
            Err(Error::NotFound(_))
        ));
        assert!(db.delete_deck(bob.id, deck.id).is_err());
        assert_eq!(db.list_decks(alice.id).unwrap().len(), 1);
    }

    #[test]
    fn test_list_decks_newest_first_with_mastery() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let first = create_deck(&db, &alice, "First", &[("a", "1"), ("b", "2"), ("c", "3")]);
        let second = create_deck(&db, &alice, "Second", &[]);

        {
            let conn = db.conn().unwrap();
            conn.execute(
                "UPDATE flashcards SET card_type = 'review', ease_factor = 2.9 WHERE deck_id = ? AND id = (SELECT MIN(id) FROM flashcards WHERE deck_id = ?)",
                params![first.id, first.id],
            )
            .unwrap();
        }

        let decks = db.list_decks(alice.id).unwrap();
        assert_eq!(decks.len(), 2);
        assert_eq!(decks[0].id, second.id);
        assert_eq!(decks[0].card_count, 0);
        assert_eq!(decks[0].mastered_percentage, 0);
        assert_eq!(decks[1].mastered_count, 1);
        assert_eq!(decks[1].mastered_percentage, 33);
    }

    #[test]
    fn test_delete_deck_removes_cards_and_orphan_notes() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Doomed", &[("a", "1"), ("b", "2")]);
        let kept_note = db.list_deck_cards(alice.id, deck.id).unwrap()[0].note_id;

        // A second deck shares one note, which must survive
        let other = db
            .create_custom_deck(alice.id, "Keep", &[kept_note], today())
            .unwrap();

        db.delete_deck(alice.id, deck.id).unwrap();

        assert!(matches!(db.get_deck(alice.id, deck.id), Err(Error::NotFound(_))));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM notes"), 1);
        assert_eq!(db.list_deck_cards(alice.id, other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_custom_deck_from_owned_notes() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let deck = create_deck(&db, &alice, "Source", &[("a", "1"), ("b", "2")]);
        let bob_deck = create_deck(&db, &bob, "Bob's", &[("x", "y")]);

        let alice_notes: Vec<i64> = db
            .list_deck_cards(alice.id, deck.id)
            .unwrap()
            .iter()
            .map(|c| c.note_id)
            .collect();
        let bob_note = db.list_deck_cards(bob.id, bob_deck.id).unwrap()[0].note_id;

        let mut ids = alice_notes.clone();
        ids.push(bob_note);
        let custom = db
            .create_custom_deck(alice.id, "Review pile", &ids, today())
            .unwrap();

        assert_eq!(custom.card_count, 2);
        assert_eq!(custom.description.as_deref(), Some(CUSTOM_DECK_DESCRIPTION));
        let custom_cards = db.list_deck_cards(alice.id, custom.id).unwrap();
        assert!(custom_cards.iter().all(|c| c.state.card_type == CardType::New));
    }

    #[test]
    fn test_custom_deck_with_no_valid_notes_creates_nothing() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let bob_deck = create_deck(&db, &bob, "Bob's", &[("x", "y")]);
        let bob_note = db.list_deck_cards(bob.id, bob_deck.id).unwrap()[0].note_id;

        let err = db
            .create_custom_deck(alice.id, "Stolen", &[bob_note, 12345], today())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(db.list_decks(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_card_inherits_deck_tags() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = db
            .create_deck(
                alice.id,
                &NewDeck {
                    name: "Tagged".to_string(),
                    tags: vec!["verbs".to_string()],
                    ..Default::default()
                },
                today(),
            )
            .unwrap();

        let card = db.add_card(alice.id, deck.id, "ser", "to be", today()).unwrap();
        assert_eq!(card.front, "ser");
        let note = db.get_note(alice.id, card.note_id).unwrap();
        assert_eq!(note.tags, vec!["verbs"]);

        assert!(matches!(
            db.add_card(alice.id, deck.id, "ser", " ", today()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_update_note_changes_card_content() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let deck = create_deck(&db, &alice, "Deck", &[("old q", "old a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        let tags = vec!["edited".to_string()];
        let note = db
            .update_note(alice.id, card.note_id, "new q", "new a", Some(&tags))
            .unwrap();
        assert_eq!(note.front, "new q");
        assert_eq!(note.tags, vec!["edited"]);

        let reloaded = db.get_card(alice.id, card.id).unwrap();
        assert_eq!(reloaded.front, "new q");
        assert_eq!(reloaded.back, "new a");

        assert!(db
            .update_note(bob.id, card.note_id, "hijack", "x", None)
            .is_err());
    }

    #[test]
    fn test_delete_note_removes_cards() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("a", "1"), ("b", "2")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        db.delete_note(alice.id, card.note_id).unwrap();
        assert_eq!(db.list_deck_cards(alice.id, deck.id).unwrap().len(), 1);
        assert!(matches!(
            db.get_card(alice.id, card.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_search_cards_filters() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");

        let spanish = db
            .create_deck(
                alice.id,
                &NewDeck {
                    name: "Spanish".to_string(),
                    tags: vec!["language".to_string()],
                    cards: cards(&[("perro", "dog"), ("gato", "cat")]),
                    ..Default::default()
                },
                today(),
            )
            .unwrap();
        let science = create_deck(&db, &alice, "Science", &[("H2O", "water"), ("dogma", "belief")]);
        create_deck(&db, &bob, "Bob", &[("dog", "perro")]);

        let all = db.search_cards(alice.id, &CardSearch::default()).unwrap();
        assert_eq!(all.len(), 4);

        let dogs = db
            .search_cards(
                alice.id,
                &CardSearch {
                    query: Some("dog".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(dogs.len(), 2);

        let language_tag = db.list_tags_for_user(alice.id).unwrap()[0].id;
        let tagged = db
            .search_cards(
                alice.id,
                &CardSearch {
                    query: Some("dog".to_string()),
                    tag_ids: vec![language_tag],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].front, "perro");
        assert_eq!(tagged[0].deck_name, "Spanish");
        assert_eq!(tagged[0].tags, vec!["language"]);

        let in_science = db
            .search_cards(
                alice.id,
                &CardSearch {
                    deck_ids: vec![science.id],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(in_science.len(), 2);
        assert!(in_science.iter().all(|r| r.deck_id == science.id));

        let both = db
            .search_cards(
                alice.id,
                &CardSearch {
                    deck_ids: vec![science.id, spanish.id],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(both.len(), 4);
    }

    #[test]
    fn test_record_review_persists_everything() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        let now = at(today(), 10);
        let outcome = db.record_review(alice.id, card.id, "Easy", now).unwrap();
        assert_eq!(outcome.points_earned, 500);
        assert_eq!(outcome.new_state.card_type, CardType::Review);
        assert_eq!(outcome.new_state.due_date, today() + Duration::days(4));

        let stored = db.get_card(alice.id, card.id).unwrap();
        assert_eq!(stored.state.card_type, CardType::Review);
        assert_eq!(stored.state.interval_days, 4);
        assert_eq!(stored.state.reps, 1);
        assert_eq!(stored.state.last_reviewed, Some(now));
        assert!((stored.state.ease_factor - 2.65).abs() < 1e-9);

        let logs = db.list_review_logs(alice.id, card.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].rating, Rating::Easy);
        assert_eq!(logs[0].interval_before, 0);
        assert_eq!(logs[0].interval_after, 4);
        assert_eq!(logs[0].review_time, now);

        let stats = db.get_user_stats(alice.id).unwrap();
        assert_eq!(stats.points, 500);
        assert_eq!(stats.total_reviews, 1);
        assert_eq!(stats.last_reviewed_date, Some(today()));
        assert_eq!(stats.review_streak_days, 1);
    }

    #[test]
    fn test_review_logs_are_append_only() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);
        db.record_review(alice.id, card.id, "good", at(today(), 10)).unwrap();

        let conn = db.conn().unwrap();
        assert!(conn
            .execute("UPDATE review_logs SET rating = 3", [])
            .is_err());
        assert!(conn.execute("DELETE FROM review_logs", []).is_err());
        drop(conn);
        assert_eq!(db.list_review_logs(alice.id, card.id).unwrap().len(), 1);

        // Deleting the deck still takes its history with it
        db.delete_deck(alice.id, deck.id).unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM review_logs"), 0);
    }

    #[test]
    fn test_record_review_accumulates_points_and_streak() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        let day1 = today();
        let day2 = today() + Duration::days(1);
        db.record_review(alice.id, card.id, "good", at(day1, 9)).unwrap();
        db.record_review(alice.id, card.id, "hard", at(day1, 18)).unwrap();
        let last = db.record_review(alice.id, card.id, "3", at(day2, 9)).unwrap();

        assert_eq!(last.stats.points, 200 + 50 + 500);
        assert_eq!(last.stats.total_reviews, 3);
        assert_eq!(last.stats.review_streak_days, 2);
        assert_eq!(db.list_review_logs(alice.id, card.id).unwrap().len(), 3);
    }

    #[test]
    fn test_record_review_invalid_rating_writes_nothing() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        let err = db
            .record_review(alice.id, card.id, "again", at(today(), 9))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(count(&db, "SELECT COUNT(*) FROM review_logs"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM user_stats"), 0);
        assert_eq!(
            db.get_card(alice.id, card.id).unwrap().state.card_type,
            CardType::New
        );
    }

    #[test]
    fn test_record_review_foreign_card_is_not_found() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        let err = db
            .record_review(bob.id, card.id, "good", at(today(), 9))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM review_logs"), 0);
    }

    #[test]
    fn test_record_review_rolls_back_on_failure() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        // Make the final write of the review fail
        db.conn()
            .unwrap()
            .execute_batch(
                r#"
                CREATE TRIGGER fail_stats BEFORE INSERT ON user_stats
                BEGIN SELECT RAISE(ABORT, 'stats unavailable'); END;
                "#,
            )
            .unwrap();

        let result = db.record_review(alice.id, card.id, "easy", at(today(), 9));
        assert!(matches!(result, Err(Error::Database(_))));

        let stored = db.get_card(alice.id, card.id).unwrap();
        assert_eq!(stored.state.card_type, CardType::New);
        assert_eq!(stored.state.reps, 0);
        assert!(stored.state.last_reviewed.is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM review_logs"), 0);
    }

    #[test]
    fn test_study_session_respects_settings() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let pairs: Vec<(String, String)> = (0..10).map(|i| (format!("q{}", i), format!("a{}", i))).collect();
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(f, b)| (f.as_str(), b.as_str())).collect();
        let deck = create_deck(&db, &alice, "Deck", &refs);

        db.save_settings(
            alice.id,
            &StudySettings {
                new_cards_per_day: 4,
                max_reviews_per_day: 2,
                ..Default::default()
            },
        )
        .unwrap();

        // Three overdue review cards and one scheduled for later
        {
            let conn = db.conn().unwrap();
            let due = (today() - Duration::days(2)).to_string();
            let later = (today() + Duration::days(5)).to_string();
            conn.execute(
                "UPDATE flashcards SET card_type = 'review', due_date = ?, interval_days = 3 WHERE id IN (SELECT id FROM flashcards ORDER BY id LIMIT 3)",
                params![due],
            )
            .unwrap();
            conn.execute(
                "UPDATE flashcards SET card_type = 'review', due_date = ?, interval_days = 9 WHERE id = (SELECT MAX(id) FROM flashcards)",
                params![later],
            )
            .unwrap();
        }

        let mut rng = StdRng::seed_from_u64(5);
        let session = db
            .get_study_session(alice.id, deck.id, today(), &mut rng)
            .unwrap();

        let new_count = session
            .iter()
            .filter(|c| c.state.card_type == CardType::New)
            .count();
        let due_count = session.len() - new_count;
        assert_eq!(new_count, 4);
        assert_eq!(due_count, 2);
        assert!(session.iter().all(|c| c.state.due_date <= today()));
    }

    #[test]
    fn test_study_session_for_foreign_deck_fails() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);

        let mut rng = StdRng::seed_from_u64(1);
        assert!(db
            .get_study_session(bob.id, deck.id, today(), &mut rng)
            .is_err());
    }

    #[test]
    fn test_performance_and_activity() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Verbs", &[("q1", "a1"), ("q2", "a2")]);
        let deck_cards = db.list_deck_cards(alice.id, deck.id).unwrap();

        let yesterday = today() - Duration::days(1);
        db.record_review(alice.id, deck_cards[0].id, "hard", at(yesterday, 8)).unwrap();
        db.record_review(alice.id, deck_cards[1].id, "good", at(today(), 8)).unwrap();
        db.record_review(alice.id, deck_cards[0].id, "easy", at(today(), 9)).unwrap();
        // Outside the window
        db.record_review(alice.id, deck_cards[1].id, "easy", at(today() - Duration::days(31), 8))
            .unwrap();

        let window = db.get_performance(alice.id, today()).unwrap();
        assert_eq!(window.len(), 31);
        assert_eq!(window[30].date, today());
        assert_eq!(window[30].review_count, 2);
        assert_eq!(window[30].average_rating, Some(2.5));
        assert_eq!(window[29].review_count, 1);
        assert_eq!(window[29].average_rating, Some(1.0));
        assert_eq!(window.iter().map(|d| d.review_count).sum::<i64>(), 3);

        let activity = db.get_recent_activity(alice.id).unwrap();
        assert_eq!(activity.len(), 4);
        assert_eq!(activity[0].rating, Rating::Easy);
        assert_eq!(activity[0].description, "Rated 'Easy' on a card in 'Verbs'");
        assert_eq!(activity[1].description, "Rated 'Good' on a card in 'Verbs'");
    }

    #[test]
    fn test_dashboard() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let deck = create_deck(&db, &alice, "Deck", &[("q", "a")]);
        create_deck(&db, &alice, "Empty", &[]);
        let card = db.list_deck_cards(alice.id, deck.id).unwrap().remove(0);

        db.record_review(alice.id, card.id, "easy", at(today(), 9)).unwrap();
        db.record_review(alice.id, card.id, "easy", at(today(), 10)).unwrap();

        let dashboard = db.get_dashboard(alice.id, today()).unwrap();
        assert_eq!(dashboard.total_decks, 2);
        // Ease 2.65 then 2.8 after the second easy review
        assert_eq!(dashboard.cards_mastered, 1);
        assert_eq!(dashboard.points, 1000);
        assert_eq!(dashboard.review_streak_days, 1);

        let later = db.get_dashboard(alice.id, today() + Duration::days(3)).unwrap();
        assert_eq!(later.review_streak_days, 0);
    }

    fn give_points(db: &Database, user: &User, points: i64) {
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO user_stats (user_id, points, total_reviews) VALUES (?, ?, 1)",
                params![user.id, points],
            )
            .unwrap();
    }

    #[test]
    fn test_leaderboard_dense_rank_and_pagination() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        let carol = create_user(&db, "carol");
        let dave = create_user(&db, "dave");
        let zero = create_user(&db, "zero");
        give_points(&db, &alice, 500);
        give_points(&db, &bob, 900);
        give_points(&db, &carol, 500);
        give_points(&db, &dave, 50);
        give_points(&db, &zero, 0);

        let page = db.get_leaderboard(dave.id, 1, 2).unwrap();
        let rows: Vec<(&str, i64)> = page
            .leaderboard
            .iter()
            .map(|e| (e.username.as_str(), e.rank))
            .collect();
        assert_eq!(rows, vec![("bob", 1), ("alice", 2)]);
        assert_eq!(page.pagination.total_entries, 4);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.current_user_rank.as_ref().unwrap().rank, 3);

        let page2 = db.get_leaderboard(dave.id, 2, 2).unwrap();
        let rows: Vec<(&str, i64)> = page2
            .leaderboard
            .iter()
            .map(|e| (e.username.as_str(), e.rank))
            .collect();
        assert_eq!(rows, vec![("carol", 2), ("dave", 3)]);

        let none = db.get_leaderboard(zero.id, 1, 50).unwrap();
        assert!(none.current_user_rank.is_none());

        let clamped = db.get_leaderboard(alice.id, 0, 100_000).unwrap();
        assert_eq!(clamped.pagination.page, 1);
        assert_eq!(clamped.pagination.limit, MAX_LEADERBOARD_LIMIT);

        // Past the end resets to the last page
        let past = db.get_leaderboard(alice.id, 9, 2).unwrap();
        assert_eq!(past.pagination.page, 2);
        let rows: Vec<&str> = past.leaderboard.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(rows, vec!["carol", "dave"]);
    }

    #[test]
    fn test_leaderboard_empty_stays_on_first_page() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");

        let page = db.get_leaderboard(alice.id, 5, 10).unwrap();
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.total_pages, 0);
        assert!(page.leaderboard.is_empty());
    }

    #[test]
    fn test_leaderboard_snapshot_refresh_replaces_rows() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        let bob = create_user(&db, "bob");
        give_points(&db, &alice, 100);

        let first = db.refresh_leaderboard_snapshot(at(today(), 1)).unwrap();
        assert_eq!(first.entries, 1);

        give_points(&db, &bob, 300);
        let second = db.refresh_leaderboard_snapshot(at(today(), 2)).unwrap();
        assert_eq!(second.entries, 2);

        let snapshot = db.get_leaderboard_snapshot(50).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].entry.username, "bob");
        assert_eq!(snapshot[0].entry.rank, 1);
        assert!(snapshot.iter().all(|e| e.captured_at == at(today(), 2)));
    }

    #[test]
    fn test_concurrent_snapshot_refreshes() {
        let db = Database::in_memory().unwrap();
        let alice = create_user(&db, "alice");
        give_points(&db, &alice, 100);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || db.refresh_leaderboard_snapshot(at(today(), i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(count(&db, "SELECT COUNT(*) FROM leaderboard_snapshots"), 1);
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("alice@example.com", "create", Some("deck"), Some(1), None)
            .unwrap();
        db.log_audit("alice@example.com", "delete", Some("deck"), Some(1), Some("{}"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "delete");
    }
}
