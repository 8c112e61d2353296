//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db, resolve_user)
//! - `decks` - Deck commands (list, CSV import/export, delete)
//! - `serve` - Web server command
//! - `stats` - Statistics and leaderboard commands
//! - `study` - Terminal study session
//! - `users` - User account commands

pub mod core;
pub mod decks;
pub mod serve;
pub mod stats;
pub mod study;
pub mod users;

// Re-export command functions for main.rs
pub use core::*;
pub use decks::*;
pub use serve::*;
pub use stats::*;
pub use study::*;
pub use users::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
