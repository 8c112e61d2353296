//! Statistics handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use super::today;
use crate::{AppError, AppState, CurrentUser};
use neuroflash_core::models::{ActivityItem, DailyReviewStat, DashboardStats};

/// GET /api/stats/dashboard - Deck count, mastered cards, points and streak
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.db.get_dashboard(user.id, today())?;

    state
        .db
        .log_audit(&user.email, "view", Some("dashboard"), None, None)?;

    Ok(Json(stats))
}

/// GET /api/stats/performance - Daily reviews over the last 30 days
pub async fn get_performance(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<DailyReviewStat>>, AppError> {
    let window = state.db.get_performance(user.id, today())?;

    state
        .db
        .log_audit(&user.email, "view", Some("performance"), None, None)?;

    Ok(Json(window))
}

/// GET /api/stats/activity - The most recent reviews
pub async fn get_recent_activity(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<ActivityItem>>, AppError> {
    let activity = state.db.get_recent_activity(user.id)?;

    state
        .db
        .log_audit(&user.email, "view", Some("activity"), None, None)?;

    Ok(Json(activity))
}
