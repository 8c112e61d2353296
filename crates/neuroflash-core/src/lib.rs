//! NeuroFlash Core Library
//!
//! Shared functionality for the NeuroFlash flashcard trainer:
//! - Spaced-repetition review scheduler and points
//! - Study session card selection
//! - Statistics aggregation (performance window, leaderboard ranks)
//! - Database access, migrations and the transactional review store
//! - Deck import/export and configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod review;
pub mod scheduler;
pub mod stats;
pub mod study;

pub use config::{AppConfig, ServerSection, StudySection};
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use review::{submit_review, ReviewOutcome, ReviewStore};
pub use scheduler::{compute_next_state, ScheduledState};
