//! Leaderboard handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppError, AppState, CurrentUser, ADMIN_ACTOR};
use neuroflash_core::db::DEFAULT_LEADERBOARD_LIMIT;
use neuroflash_core::models::{LeaderboardPage, LeaderboardSnapshotEntry, SnapshotRefreshResult};

/// Query parameters for the leaderboard
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_LEADERBOARD_LIMIT
}

/// GET /api/leaderboard - Live dense-ranked leaderboard with the caller's rank
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardPage>, AppError> {
    let page = state
        .db
        .get_leaderboard(user.id, params.page, params.limit)?;

    state.db.log_audit(
        &user.email,
        "view",
        Some("leaderboard"),
        None,
        Some(&format!(
            "page={}, limit={}",
            page.pagination.page, page.pagination.limit
        )),
    )?;

    Ok(Json(page))
}

/// GET /api/leaderboard/snapshot - The last materialized leaderboard
pub async fn get_leaderboard_snapshot(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardSnapshotEntry>>, AppError> {
    let entries = state.db.get_leaderboard_snapshot(params.limit)?;

    state.db.log_audit(
        &user.email,
        "view",
        Some("leaderboard_snapshot"),
        None,
        Some(&format!("rows={}", entries.len())),
    )?;

    Ok(Json(entries))
}

/// POST /api/admin/leaderboard/refresh - Rebuild the snapshot (admin key)
pub async fn refresh_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SnapshotRefreshResult>, AppError> {
    let result = state.db.refresh_leaderboard_snapshot(Utc::now())?;

    state.db.log_audit(
        ADMIN_ACTOR,
        "leaderboard_refresh",
        Some("leaderboard"),
        None,
        Some(&format!("entries={}", result.entries)),
    )?;

    Ok(Json(result))
}
