//! NeuroFlash Web Server
//!
//! Axum-based REST API for the NeuroFlash flashcard trainer.
//!
//! Security features:
//! - Per-user bearer tokens (issued at login, stored as digests)
//! - Separate admin API keys for maintenance endpoints
//! - Restrictive CORS policy
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use neuroflash_core::db::Database;
use neuroflash_core::models::User;

mod handlers;
mod scheduler;

pub use scheduler::{start_leaderboard_refresh, LeaderboardRefreshConfig};

/// Maximum JSON request body size (1 MB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Authorization header for bearer tokens and admin keys
const AUTHORIZATION_HEADER: &str = "authorization";

/// Routes reachable without a token
const PUBLIC_PATHS: &[&str] = &["/api/signup", "/api/login"];

/// Route prefixes that require an admin API key instead of a user token
const ADMIN_PREFIXES: &[&str] = &["/api/admin", "/api/audit"];

/// Audit actor recorded for admin-key requests
pub const ADMIN_ACTOR: &str = "admin-key";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted on admin routes
    /// Format: "Bearer <key>" in Authorization header
    pub admin_keys: Vec<String>,
    /// Background leaderboard snapshot refresh, disabled when `None`
    pub leaderboard_refresh: Option<LeaderboardRefreshConfig>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

/// The user a bearer token resolved to, inserted by the auth middleware
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Authentication middleware
///
/// Signup and login are public. Admin routes need one of the configured
/// admin keys. Everything else needs a user token, which is resolved to a
/// [`CurrentUser`] and handed to the handler through request extensions.
///
/// Admin keys are compared in constant time.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let token = bearer_token(request.headers()).map(str::to_string);

    if ADMIN_PREFIXES.iter().any(|p| path.starts_with(p)) {
        let key_valid = token
            .as_deref()
            .map(|key| validate_api_key(key, &state.config.admin_keys))
            .unwrap_or(false);

        if key_valid {
            info!(user = ADMIN_ACTOR, path = %path, "Authenticated via admin key");
            return next.run(request).await;
        }

        warn!(path = %path, "Rejected admin request - no valid admin key");
        return unauthorized("Admin key required");
    }

    let Some(token) = token else {
        warn!(path = %path, "Unauthorized request - no bearer token");
        return unauthorized("Authentication required");
    };

    match state.db.user_for_token(&token) {
        Ok(Some(user)) => {
            debug!(user = %user.email, path = %path, "Authenticated via bearer token");
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %path, "Unauthorized request - unknown token");
            unauthorized("Authentication required")
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Extract the bearer token from the Authorization header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && provided_bytes.ct_eq(key_bytes).into() {
            return true;
        }
    }
    false
}

/// Parse a comma-separated list of admin keys, dropping blanks
pub fn parse_admin_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let body = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Request body too large"))?;

    serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        AppError::bad_request("Invalid JSON")
    })
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    if config.admin_keys.is_empty() {
        info!("ℹ️  No admin keys configured (set NEUROFLASH_ADMIN_KEYS to enable admin routes)");
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Auth
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::get_me))
        // Profile and study settings
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // Decks
        .route("/decks", get(handlers::list_decks).post(handlers::create_deck))
        .route("/decks/custom", post(handlers::create_custom_deck))
        .route(
            "/decks/:id",
            get(handlers::get_deck).delete(handlers::delete_deck),
        )
        .route(
            "/decks/:id/cards",
            get(handlers::list_deck_cards).post(handlers::add_card),
        )
        // Notes and card browser
        .route(
            "/notes/:id",
            put(handlers::update_note).delete(handlers::delete_note),
        )
        .route("/cards/search", get(handlers::search_cards))
        // Tags
        .route("/tags", get(handlers::list_tags))
        // Study
        .route("/study/session/:deck_id", get(handlers::get_study_session))
        .route("/study/review/:card_id", post(handlers::submit_review))
        // Statistics
        .route("/stats/dashboard", get(handlers::get_dashboard))
        .route("/stats/performance", get(handlers::get_performance))
        .route("/stats/activity", get(handlers::get_recent_activity))
        // Leaderboard
        .route("/leaderboard", get(handlers::get_leaderboard))
        .route(
            "/leaderboard/snapshot",
            get(handlers::get_leaderboard_snapshot),
        )
        // Admin
        .route(
            "/admin/leaderboard/refresh",
            post(handlers::refresh_leaderboard),
        )
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if let Some(refresh) = config.leaderboard_refresh.clone() {
        start_leaderboard_refresh(db.clone(), refresh);
    }

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<neuroflash_core::Error> for AppError {
    fn from(err: neuroflash_core::Error) -> Self {
        use neuroflash_core::Error as CoreError;

        match err {
            CoreError::Validation(msg) => Self::bad_request(&msg),
            // Other users' resources are reported as missing
            CoreError::NotFound(msg) | CoreError::AccessDenied(msg) => Self::not_found(&msg),
            CoreError::Conflict(msg) => Self::conflict(&msg),
            CoreError::Auth(msg) => Self::unauthorized(&msg),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(other.into()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<neuroflash_core::Error>() {
            Ok(core) => core.into(),
            Err(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}
