// SPDX-License-Identifier: PMPL-1.0-or-later
//! AccountDB API
//!
//! HTTP API server for AccountDB.
//! Exposes user CRUD over REST, backed by [`accountdb_storage::RecordStore`].

pub mod service;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, head, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use accountdb_storage::{RecordStore, StoreError, User, UserId};

pub use service::UserService;

/// Environment variable overriding [`ApiConfig::port`].
pub const ENV_PORT: &str = "PORT";

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::LockTimeout { .. } => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Cannot bind request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Cannot bind request params: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// API version prefix
    pub version_prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            version_prefix: "/api/v1".to_string(),
        }
    }
}

impl ApiConfig {
    /// Defaults, with the port taken from `PORT` when set and valid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match std::env::var(ENV_PORT) {
            Ok(raw) if !raw.is_empty() => match raw.parse() {
                Ok(port) => config.port = port,
                Err(err) => warn!(var = ENV_PORT, value = %raw, %err, "ignoring invalid port"),
            },
            _ => {}
        }
        config
    }

    /// `host:port` for binding.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Plain message body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Single user body
#[derive(Debug, Serialize, Deserialize)]
pub struct UserDetailsResponse {
    #[serde(rename = "userDetails")]
    pub user_details: User,
}

/// User list body
#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// `GET /users` query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of users to return
    pub limit: Option<String>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub start_time: std::time::Instant,
    pub users: UserService,
}

impl AppState {
    pub fn new(store: RecordStore) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            users: UserService::new(store),
        }
    }
}

/// Build the API router
pub fn build_router(state: AppState, config: &ApiConfig) -> Router {
    let users = Router::new()
        .route("/users-filter", get(get_users_by_ids_handler))
        .route("/users", get(get_users_handler))
        .route("/users/register", post(add_user_handler))
        .route("/users/status", head(check_status_handler))
        .route(
            "/users/{userid}",
            get(get_user_handler)
                .put(update_user_handler)
                .patch(update_user_handler)
                .delete(delete_user_handler)
                .options(options_handler),
        );

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .nest(&config.version_prefix, users)
        .with_state(state)
}

/// Liveness ping
#[instrument]
async fn ping_handler() -> Json<MessageResponse> {
    MessageResponse::new("Mock server is running.")
}

/// Health check handler
#[instrument(skip(state))]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Register (upsert) a user
#[instrument(skip(state, body))]
async fn add_user_handler(
    State(state): State<AppState>,
    body: Result<Json<User>, JsonRejection>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let Json(user) = body?;
    state.users.add_user(&user).await?;
    info!(id = %user.id, "user added");
    Ok(Json(UserDetailsResponse { user_details: user }))
}

/// List users in key order, optionally truncated to `limit`
#[instrument(skip(state))]
async fn get_users_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    let limit = match query.limit.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("invalid limit '{raw}'")))?,
        ),
    };

    let mut users = state.users.get_all_users().await?;
    if let Some(limit) = limit {
        users.truncate(limit);
    }
    Ok(Json(UsersResponse { users }))
}

/// Fetch one user
#[instrument(skip(state))]
async fn get_user_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let Path(id) = path?;
    let user = state.users.get_user(UserId(id)).await?;
    Ok(Json(UserDetailsResponse { user_details: user }))
}

/// Fetch the users for every `uid` query parameter that exists
#[instrument(skip(state))]
async fn get_users_by_ids_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<UsersResponse>, ApiError> {
    let ids = params
        .iter()
        .filter(|(name, _)| name == "uid")
        .map(|(_, value)| {
            value
                .parse::<u64>()
                .map(UserId)
                .map_err(|_| ApiError::BadRequest(format!("Cannot bind request params: uid '{value}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ApiError::BadRequest("Request params are required".to_string()));
    }

    let users = state.users.get_users_by_ids(&ids).await?;
    Ok(Json(UsersResponse { users }))
}

/// Overwrite a user (PUT and PATCH). The body id must match the path id.
#[instrument(skip(state, body))]
async fn update_user_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
    body: Result<Json<User>, JsonRejection>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let Path(id) = path?;
    let Json(user) = body?;
    if user.id != UserId(id) {
        return Err(ApiError::BadRequest(format!(
            "body id {} does not match path id {}",
            user.id, id
        )));
    }

    state.users.update_user(&user).await?;
    Ok(Json(UserDetailsResponse { user_details: user }))
}

/// Delete a user; unknown ids succeed
#[instrument(skip(state))]
async fn delete_user_handler(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path?;
    state.users.delete_user(UserId(id)).await?;
    Ok(MessageResponse::new("Success"))
}

/// Status probe for HEAD clients
#[instrument]
async fn check_status_handler() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")])
}

/// CORS preflight for user resources
#[instrument]
async fn options_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                "GET,POST,PUT,PATCH,DELETE,OPTIONS",
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "authorization, origin, content-type, accept",
            ),
            (header::ALLOW, "HEAD,GET,POST,PUT,PATCH,DELETE,OPTIONS"),
            (header::CONTENT_TYPE, "application/json"),
        ],
    )
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Start the API server and run until Ctrl-C
pub async fn serve(config: ApiConfig, store: RecordStore) -> Result<(), std::io::Error> {
    let state = AppState::new(store);
    let app = build_router(state, &config);

    let addr = config.socket_addr();
    info!("Starting AccountDB API server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
