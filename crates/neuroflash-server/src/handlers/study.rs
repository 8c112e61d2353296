//! Study session and review handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::today;
use crate::{read_json, AppError, AppState, CurrentUser};
use neuroflash_core::models::{Card, CardType};
use neuroflash_core::stats::round2;

/// Request body for POST /api/study/review/:card_id
///
/// The rating is accepted as a name ("hard", "good", "easy") or an ordinal.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: serde_json::Value,
}

/// Card state returned after a review
#[derive(Debug, Serialize)]
pub struct ReviewedState {
    pub card_type: CardType,
    pub due_date: NaiveDate,
    pub intervals: i64,
    pub ease_factor: f64,
    pub reps: i64,
    pub lapses: i64,
}

/// Response for POST /api/study/review/:card_id
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub message: String,
    pub flashcard_id: i64,
    pub points_earned: i64,
    pub new_state: ReviewedState,
}

/// GET /api/study/session/:deck_id - Today's cards for a deck, shuffled
pub async fn get_study_session(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(deck_id): Path<i64>,
) -> Result<Json<Vec<Card>>, AppError> {
    let cards = state
        .db
        .get_study_session(user.id, deck_id, today(), &mut rand::thread_rng())?;

    state.db.log_audit(
        &user.email,
        "study_session",
        Some("deck"),
        Some(deck_id),
        Some(&format!("cards={}", cards.len())),
    )?;

    Ok(Json(cards))
}

/// POST /api/study/review/:card_id - Record a rating and reschedule the card
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(card_id): Path<i64>,
    request: Request,
) -> Result<Json<ReviewResponse>, AppError> {
    let body: ReviewRequest = read_json(request).await?;
    let rating = match &body.rating {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(AppError::bad_request("Rating must be hard, good or easy")),
    };

    let outcome = state.db.record_review(user.id, card_id, &rating, Utc::now())?;

    // The review is committed at this point; an audit failure must not fail the request
    if let Err(e) = state.db.log_audit(
        &user.email,
        "review",
        Some("card"),
        Some(card_id),
        Some(&format!(
            "rating={}, points={}",
            rating, outcome.points_earned
        )),
    ) {
        warn!("Failed to log review to audit: {}", e);
    }

    info!(
        user_id = user.id,
        card_id,
        points = outcome.points_earned,
        "Review recorded"
    );

    let new_state = &outcome.new_state;
    Ok(Json(ReviewResponse {
        success: true,
        message: outcome.message(),
        flashcard_id: outcome.flashcard_id,
        points_earned: outcome.points_earned,
        new_state: ReviewedState {
            card_type: new_state.card_type,
            due_date: new_state.due_date,
            intervals: new_state.interval_days,
            ease_factor: round2(new_state.ease_factor),
            reps: new_state.reps,
            lapses: new_state.lapses,
        },
    }))
}
