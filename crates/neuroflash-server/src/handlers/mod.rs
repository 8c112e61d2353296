//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

use chrono::{NaiveDate, Utc};

pub mod audit;
pub mod auth;
pub mod decks;
pub mod leaderboard;
pub mod notes;
pub mod profile;
pub mod stats;
pub mod study;
pub mod tags;

// Re-export all handlers for use in router
pub use audit::*;
pub use auth::*;
pub use decks::*;
pub use leaderboard::*;
pub use notes::*;
pub use profile::*;
pub use stats::*;
pub use study::*;
pub use tags::*;

/// The calendar date reviews and due dates are measured against
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
