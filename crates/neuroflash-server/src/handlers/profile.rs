//! Profile and study settings handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Extension, Json,
};

use crate::{read_json, AppError, AppState, CurrentUser};
use neuroflash_core::models::{Profile, ProfileUpdate};

/// GET /api/profile - Profile, study settings and points
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.db.get_profile(user.id)?;

    state
        .db
        .log_audit(&user.email, "view", Some("profile"), Some(user.id), None)?;

    Ok(Json(profile))
}

/// PUT /api/profile - Update name, email and study settings
///
/// Absent fields keep their current value. Settings are validated as a
/// whole after merging.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<Profile>, AppError> {
    let update: ProfileUpdate = read_json(request).await?;

    let profile = state.db.update_profile(user.id, &update)?;

    state.db.log_audit(
        &user.email,
        "update",
        Some("profile"),
        Some(user.id),
        Some(&format!(
            "new_cards_per_day={}, max_reviews_per_day={}, ease_bonus={}",
            profile.settings.new_cards_per_day,
            profile.settings.max_reviews_per_day,
            profile.settings.ease_bonus
        )),
    )?;

    Ok(Json(profile))
}
