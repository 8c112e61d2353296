//! Note editing and card browser handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{read_json, AppError, AppState, CurrentUser, SuccessResponse};
use neuroflash_core::db::parse_id_list;
use neuroflash_core::models::{CardSearch, CardSearchResult, Note};

/// Request body for PUT /api/notes/:id
#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub front: String,
    pub back: String,
    /// Replaces the note's tags when present
    pub tags: Option<Vec<String>>,
}

/// Query parameters for card search
///
/// `tags` and `deck_id` take comma-separated IDs.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub tags: Option<String>,
    pub deck_id: Option<String>,
}

impl SearchQuery {
    fn to_search(&self) -> Result<CardSearch, AppError> {
        Ok(CardSearch {
            query: self.query.clone(),
            tag_ids: parse_id_list(self.tags.as_deref().unwrap_or(""))?,
            deck_ids: parse_id_list(self.deck_id.as_deref().unwrap_or(""))?,
        })
    }
}

/// PUT /api/notes/:id - Edit a note's content and tags
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Note>, AppError> {
    let body: UpdateNoteRequest = read_json(request).await?;

    let note = state
        .db
        .update_note(user.id, id, &body.front, &body.back, body.tags.as_deref())?;

    state
        .db
        .log_audit(&user.email, "update", Some("note"), Some(id), None)?;

    Ok(Json(note))
}

/// DELETE /api/notes/:id - Delete a note and every card made from it
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_note(user.id, id)?;

    state
        .db
        .log_audit(&user.email, "delete", Some("note"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/cards/search - Search the user's cards
pub async fn search_cards(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<CardSearchResult>>, AppError> {
    let search = params.to_search()?;
    let results = state.db.search_cards(user.id, &search)?;

    state.db.log_audit(
        &user.email,
        "search",
        Some("card"),
        None,
        Some(&format!(
            "query={}, results={}",
            params.query.as_deref().unwrap_or(""),
            results.len()
        )),
    )?;

    Ok(Json(results))
}
