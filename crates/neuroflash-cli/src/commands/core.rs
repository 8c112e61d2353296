//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Look up the user a command acts for
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use neuroflash_core::db::{Database, DB_KEY_ENV};
use neuroflash_core::models::User;

/// Open database with encryption by default, or unencrypted if --no-encrypt
///
/// Creates the parent directory when needed, so the default location under
/// the platform data directory works on first run.
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Find a user by email or fail with a helpful message
pub fn resolve_user(db: &Database, email: &str) -> Result<User> {
    match db.get_user_by_email(email)? {
        Some(user) => Ok(user),
        None => bail!(
            "No user with email '{}'. Create one with 'neuroflash users add'",
            email
        ),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs the migrations
    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED ({})", DB_KEY_ENV);
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a user: neuroflash users add --username me --email me@example.com");
    println!("  2. Import a deck: neuroflash decks import --file cards.csv --deck Spanish --user me@example.com");
    println!("  3. Start web UI: neuroflash serve");

    Ok(())
}
