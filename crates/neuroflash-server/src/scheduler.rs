//! Background leaderboard snapshot refresh
//!
//! Optional periodic refresh of the denormalized leaderboard table, enabled
//! via `NEUROFLASH_LEADERBOARD_REFRESH_MINUTES` or the `[server]` section of
//! the config file. Refreshes go through the same locked path as the admin
//! endpoint, so a scheduled run and a manual one never interleave.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use neuroflash_core::Database;

/// Environment variable holding the refresh interval in minutes
pub const REFRESH_MINUTES_ENV: &str = "NEUROFLASH_LEADERBOARD_REFRESH_MINUTES";

/// Configuration for the scheduled leaderboard refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRefreshConfig {
    /// Interval between refreshes in minutes
    pub interval_minutes: u64,
}

impl LeaderboardRefreshConfig {
    /// Build from a configured interval; zero disables the refresh
    pub fn from_minutes(minutes: u64) -> Option<Self> {
        if minutes == 0 {
            warn!("Leaderboard refresh interval is 0, scheduled refresh disabled");
            return None;
        }
        Some(Self {
            interval_minutes: minutes,
        })
    }

    /// Parse configuration from the environment
    ///
    /// Returns None if the variable is unset, unparseable or zero
    pub fn from_env() -> Option<Self> {
        let minutes: u64 = std::env::var(REFRESH_MINUTES_ENV)
            .ok()
            .and_then(|s| s.trim().parse().ok())?;
        Self::from_minutes(minutes)
    }
}

/// Start the leaderboard refresh as a background task
pub fn start_leaderboard_refresh(db: Database, config: LeaderboardRefreshConfig) {
    info!(
        "Starting leaderboard refresh: every {} minute(s)",
        config.interval_minutes
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_minutes * 60));

        // The first tick completes immediately; refresh once on startup
        loop {
            ticker.tick().await;
            run_scheduled_refresh(&db);
        }
    });
}

/// Run a single refresh, logging the outcome
fn run_scheduled_refresh(db: &Database) {
    match db.refresh_leaderboard_snapshot(Utc::now()) {
        Ok(result) => {
            info!(entries = result.entries, "Scheduled leaderboard refresh completed");

            if let Err(e) = db.log_audit(
                "scheduler",
                "leaderboard_refresh",
                Some("leaderboard"),
                None,
                Some(&format!("entries={}", result.entries)),
            ) {
                warn!("Failed to log scheduled refresh to audit: {}", e);
            }
        }
        Err(e) => {
            error!("Scheduled leaderboard refresh failed: {}", e);
        }
    }
}
