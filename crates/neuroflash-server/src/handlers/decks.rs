//! Deck handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use super::today;
use crate::{read_json, AppError, AppState, CurrentUser, SuccessResponse};
use neuroflash_core::models::{Card, Deck, NewCardContent, NewDeck};

/// Request body for POST /api/decks/custom
#[derive(Debug, Deserialize)]
pub struct CustomDeckRequest {
    pub name: String,
    #[serde(default)]
    pub note_ids: Vec<i64>,
}

/// GET /api/decks - The user's decks with progress
pub async fn list_decks(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Deck>>, AppError> {
    let decks = state.db.list_decks(user.id)?;

    state.db.log_audit(
        &user.email,
        "list",
        Some("deck"),
        None,
        Some(&format!("count={}", decks.len())),
    )?;

    Ok(Json(decks))
}

/// POST /api/decks - Create a deck with tags and initial cards
pub async fn create_deck(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
) -> Result<(StatusCode, Json<Deck>), AppError> {
    let new_deck: NewDeck = read_json(request).await?;

    let deck = state.db.create_deck(user.id, &new_deck, today())?;

    state.db.log_audit(
        &user.email,
        "create",
        Some("deck"),
        Some(deck.id),
        Some(&format!("name={}, cards={}", deck.name, deck.card_count)),
    )?;

    Ok((StatusCode::CREATED, Json(deck)))
}

/// POST /api/decks/custom - Build a deck from existing notes
pub async fn create_custom_deck(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
) -> Result<(StatusCode, Json<Deck>), AppError> {
    let body: CustomDeckRequest = read_json(request).await?;

    let deck = state
        .db
        .create_custom_deck(user.id, &body.name, &body.note_ids, today())?;

    state.db.log_audit(
        &user.email,
        "create_custom",
        Some("deck"),
        Some(deck.id),
        Some(&format!("name={}, notes={}", deck.name, body.note_ids.len())),
    )?;

    Ok((StatusCode::CREATED, Json(deck)))
}

/// GET /api/decks/:id - A single deck
pub async fn get_deck(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Deck>, AppError> {
    let deck = state.db.get_deck(user.id, id)?;

    state
        .db
        .log_audit(&user.email, "view", Some("deck"), Some(id), None)?;

    Ok(Json(deck))
}

/// DELETE /api/decks/:id - Delete a deck and its cards
pub async fn delete_deck(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_deck(user.id, id)?;

    state
        .db
        .log_audit(&user.email, "delete", Some("deck"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/decks/:id/cards - Cards in a deck
pub async fn list_deck_cards(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Card>>, AppError> {
    let cards = state.db.list_deck_cards(user.id, id)?;

    state.db.log_audit(
        &user.email,
        "list",
        Some("card"),
        Some(id),
        Some(&format!("count={}", cards.len())),
    )?;

    Ok(Json(cards))
}

/// POST /api/decks/:id/cards - Add a card to a deck
pub async fn add_card(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<(StatusCode, Json<Card>), AppError> {
    let content: NewCardContent = read_json(request).await?;

    let card = state
        .db
        .add_card(user.id, id, &content.front, &content.back, today())?;

    state.db.log_audit(
        &user.email,
        "create",
        Some("card"),
        Some(card.id),
        Some(&format!("deck_id={}", id)),
    )?;

    Ok((StatusCode::CREATED, Json(card)))
}
