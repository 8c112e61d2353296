//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Accounts, password verification, API tokens, profiles
//! - `settings` - Per-user study settings
//! - `decks` - Deck CRUD, custom decks, deck card listing
//! - `notes` - Note editing and card search
//! - `tags` - Tag lookup and association
//! - `reviews` - Transactional review store
//! - `study` - Study session loading
//! - `stats` - Dashboard, performance, activity and leaderboard
//! - `audit` - Audit log

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Row;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{Card, CardState, NoteFields, StudySettings};

mod audit;
mod decks;
mod notes;
mod reviews;
mod settings;
mod stats;
mod study;
mod tags;
mod users;

pub use audit::AuditEntry;
pub use decks::CUSTOM_DECK_DESCRIPTION;
pub use notes::{parse_id_list, SEARCH_LIMIT};
pub use reviews::SqliteReviewStore;
pub use stats::{DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "NEUROFLASH_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the
/// same key regardless of where the database file lives.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"neuroflash-salt1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(output.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Column list understood by [`card_from_row`]
///
/// Expects `flashcards f` joined with `notes n`.
pub(crate) const CARD_COLUMNS: &str = "f.id, f.note_id, f.deck_id, n.field_values, f.card_type, \
     f.due_date, f.ease_factor, f.interval_days, f.reps, f.lapses, f.last_reviewed, f.created_at";

pub(crate) fn card_from_row(row: &Row) -> rusqlite::Result<Card> {
    let fields_raw: String = row.get(3)?;
    let fields = NoteFields::decode(&fields_raw);
    let card_type_str: String = row.get(4)?;
    let due_str: String = row.get(5)?;
    let last_reviewed: Option<String> = row.get(10)?;
    let created_str: String = row.get(11)?;

    Ok(Card {
        id: row.get(0)?,
        note_id: row.get(1)?,
        deck_id: row.get(2)?,
        front: fields.front,
        back: fields.back,
        state: CardState {
            card_type: card_type_str.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            due_date: parse_date(&due_str)?,
            ease_factor: row.get(6)?,
            interval_days: row.get(7)?,
            reps: row.get(8)?,
            lapses: row.get(9)?,
            last_reviewed: last_reviewed.as_deref().map(parse_datetime),
        },
        created_at: parse_datetime(&created_str),
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    /// Study settings for users who have not saved their own
    study_defaults: StudySettings,
    /// Serializes leaderboard snapshot refreshes
    snapshot_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `NEUROFLASH_DB_KEY` to be set. Use `new_unencrypted()` for
    /// development and testing.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = match passphrase {
            Some(pass) => Some(format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?)),
            None => None,
        };

        // Foreign keys are per connection, so enable them for every pooled one
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(pragma) = &key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            study_defaults: StudySettings::default(),
            snapshot_lock: Arc::new(Mutex::new(())),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Replace the study settings handed to users without saved settings
    pub fn with_study_defaults(mut self, defaults: StudySettings) -> Self {
        self.study_defaults = defaults;
        self
    }

    pub fn study_defaults(&self) -> &StudySettings {
        &self.study_defaults
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "neuroflash_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the review writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                date_of_birth DATE,
                gender TEXT,
                country TEXT,
                city TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Bearer tokens, stored as SHA-256 hex digests
            CREATE TABLE IF NOT EXISTS api_tokens (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_used_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_api_tokens_user ON api_tokens(user_id);

            CREATE TABLE IF NOT EXISTS settings (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                new_cards_per_day INTEGER NOT NULL,
                max_reviews_per_day INTEGER NOT NULL,
                learning_steps TEXT NOT NULL,
                ease_bonus REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS decks (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_decks_user ON decks(user_id);

            CREATE TABLE IF NOT EXISTS note_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                fields TEXT NOT NULL                    -- JSON array of field names
            );
            INSERT OR IGNORE INTO note_types (id, name, fields)
                VALUES (1, 'Basic', '["Front","Back"]');

            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                note_type_id INTEGER NOT NULL DEFAULT 1 REFERENCES note_types(id),
                field_values TEXT NOT NULL,             -- JSON {"Front": ..., "Back": ...}
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);

            CREATE TABLE IF NOT EXISTS flashcards (
                id INTEGER PRIMARY KEY,
                note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                card_type TEXT NOT NULL DEFAULT 'new',  -- new, learning, review
                due_date DATE NOT NULL,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 0,
                reps INTEGER NOT NULL DEFAULT 0,
                lapses INTEGER NOT NULL DEFAULT 0,
                last_reviewed DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_flashcards_deck ON flashcards(deck_id);
            CREATE INDEX IF NOT EXISTS idx_flashcards_note ON flashcards(note_id);
            CREATE INDEX IF NOT EXISTS idx_flashcards_due ON flashcards(user_id, card_type, due_date);

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE
            );

            CREATE TABLE IF NOT EXISTS deck_tags (
                deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (deck_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS note_tags (
                note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (note_id, tag_id)
            );

            -- Append-only review history
            CREATE TABLE IF NOT EXISTS review_logs (
                id INTEGER PRIMARY KEY,
                flashcard_id INTEGER NOT NULL REFERENCES flashcards(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 3),
                review_time DATETIME NOT NULL,
                interval_before INTEGER NOT NULL,
                interval_after INTEGER NOT NULL,
                ease_factor_before REAL NOT NULL,
                ease_factor_after REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_review_logs_user_time ON review_logs(user_id, review_time);
            CREATE INDEX IF NOT EXISTS idx_review_logs_card ON review_logs(flashcard_id);

            -- Rows only leave with their card or user (cascade)
            CREATE TRIGGER IF NOT EXISTS review_logs_no_update
            BEFORE UPDATE ON review_logs
            BEGIN
                SELECT RAISE(ABORT, 'review_logs is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS review_logs_no_delete
            BEFORE DELETE ON review_logs
            WHEN EXISTS (SELECT 1 FROM flashcards WHERE id = OLD.flashcard_id)
                AND EXISTS (SELECT 1 FROM users WHERE id = OLD.user_id)
            BEGIN
                SELECT RAISE(ABORT, 'review_logs is append-only');
            END;

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                points INTEGER NOT NULL DEFAULT 0,
                total_reviews INTEGER NOT NULL DEFAULT 0,
                last_reviewed_date DATE,
                review_streak_days INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_user_stats_points ON user_stats(points DESC);

            -- Denormalized top-N leaderboard, rebuilt wholesale
            CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
                rank INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                points INTEGER NOT NULL,
                captured_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_email TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
