use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{DueItem, EventList, Policy, ReminderConfig, chunk_lines, due_items, parse_cell};

#[derive(Clone)]
pub struct AppState {
    config: Arc<RwLock<ReminderConfig>>,
}

impl AppState {
    pub fn new(config: ReminderConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn with_shared(config: Arc<RwLock<ReminderConfig>>) -> Self {
        Self { config }
    }

    fn config(&self) -> ReminderConfig {
        self.config.read().clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Invalid(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(message) => {
                let body = Json(ErrorBody {
                    error: "invalid_request",
                    message,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    cell: String,
    today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct ParseResponse {
    today: NaiveDate,
    events: EventList,
}

#[derive(Debug, Deserialize)]
struct DuePayload {
    cell: String,
    today: Option<NaiveDate>,
    policy: Option<Policy>,
}

#[derive(Debug, Serialize)]
struct DueResponse {
    today: NaiveDate,
    policy: Policy,
    due: Vec<DueItem>,
}

#[derive(Debug, Deserialize)]
struct ChunksPayload {
    lines: Vec<String>,
    max_len: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChunksResponse {
    chunks: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config).put(update_config))
        .route("/parse", post(parse))
        .route("/due", post(due))
        .route("/chunks", post(chunks))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, config: ReminderConfig) -> std::io::Result<()> {
    serve_shared(addr, Arc::new(RwLock::new(config))).await
}

/// Serve with a config handle the caller keeps, e.g. for a sweep loop.
pub async fn serve_shared(
    addr: SocketAddr,
    config: Arc<RwLock<ReminderConfig>>,
) -> std::io::Result<()> {
    let app = router(AppState::with_shared(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_config(State(state): State<AppState>) -> Json<ReminderConfig> {
    Json(state.config())
}

async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<ReminderConfig>,
) -> Result<Json<ReminderConfig>, ApiError> {
    if config.max_chunk_length == 0 {
        return Err(ApiError::invalid("max_chunk_length must be positive"));
    }
    {
        let mut guard = state.config.write();
        *guard = config;
    }
    Ok(Json(state.config()))
}

async fn parse(
    State(state): State<AppState>,
    Json(payload): Json<ParsePayload>,
) -> Json<ParseResponse> {
    let today = payload
        .today
        .unwrap_or_else(|| state.config().today(Utc::now()));
    let events = parse_cell(&payload.cell, today);
    debug!(%today, events = events.len(), "parse request");
    Json(ParseResponse { today, events })
}

async fn due(State(state): State<AppState>, Json(payload): Json<DuePayload>) -> Json<DueResponse> {
    let config = state.config();
    let today = payload.today.unwrap_or_else(|| config.today(Utc::now()));
    let policy = payload.policy.unwrap_or(config.policy);
    let events = parse_cell(&payload.cell, today);
    let due = due_items(&events, today, &policy);
    Json(DueResponse { today, policy, due })
}

async fn chunks(
    State(state): State<AppState>,
    Json(payload): Json<ChunksPayload>,
) -> Result<Json<ChunksResponse>, ApiError> {
    let max_len = payload
        .max_len
        .unwrap_or_else(|| state.config().max_chunk_length);
    if max_len == 0 {
        return Err(ApiError::invalid("max_len must be positive"));
    }
    Ok(Json(ChunksResponse {
        chunks: chunk_lines(&payload.lines, max_len),
    }))
}
