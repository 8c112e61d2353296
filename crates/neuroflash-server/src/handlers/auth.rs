//! Account and session handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{bearer_token, read_json, AppError, AppState, CurrentUser, SuccessResponse};
use neuroflash_core::models::{NewUser, User};

/// Request body for POST /api/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for POST /api/login
#[derive(Serialize)]
pub struct LoginResponse {
    /// Bearer token, shown only once
    pub token: String,
    pub user: User,
}

/// POST /api/signup - Register a new account
pub async fn signup(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<User>), AppError> {
    let new_user: NewUser = read_json(request).await?;

    let user = state.db.create_user(&new_user)?;

    state.db.log_audit(
        &user.email,
        "signup",
        Some("user"),
        Some(user.id),
        Some(&format!("username={}", user.username)),
    )?;

    info!(user_id = user.id, "Registered new user");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<LoginResponse>, AppError> {
    let body: LoginRequest = read_json(request).await?;

    let user = match state.db.authenticate(&body.email, &body.password) {
        Ok(user) => user,
        Err(e) => {
            warn!(email = %body.email, "Failed login attempt");
            return Err(e.into());
        }
    };
    let token = state.db.issue_token(user.id)?;

    state
        .db
        .log_audit(&user.email, "login", Some("user"), Some(user.id), None)?;

    Ok(Json(LoginResponse { token, user }))
}

/// POST /api/logout - Revoke the token used for this request
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    let revoked = state.db.revoke_token(token)?;

    state
        .db
        .log_audit(&user.email, "logout", Some("user"), Some(user.id), None)?;

    Ok(Json(SuccessResponse { success: revoked }))
}

/// GET /api/me - The authenticated user
pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}
