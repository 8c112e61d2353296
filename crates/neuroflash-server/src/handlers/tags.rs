//! Tag handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState, CurrentUser};
use neuroflash_core::models::Tag;

/// GET /api/tags - Tags on any of the user's notes or decks
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Tag>>, AppError> {
    let tags = state.db.list_tags_for_user(user.id)?;

    state.db.log_audit(&user.email, "list", Some("tag"), None, None)?;

    Ok(Json(tags))
}
