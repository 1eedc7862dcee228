//! HTTP surface.
//!
//! - `POST /search` `{query}` → `{results}`
//! - `GET /history` → `{searches}` (newest first, at most 10)
//! - `GET /results/{search_id}` → `{results}` (empty for unknown or non-numeric ids)
//! - `GET /health` → `OK`

use crate::error::AffilscanError;
use crate::extract::NormalizedRecord;
use crate::service::SearchService;
use crate::store::SearchQuery;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/history", get(history_handler))
        .route("/results/{search_id}", get(results_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn run_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

/// Error wrapper that maps crate errors onto HTTP statuses
pub struct ApiError(AffilscanError);

impl From<AffilscanError> for ApiError {
    fn from(err: AffilscanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.0.to_string() })),
            )
                .into_response();
        }

        error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error" })),
        )
            .into_response()
    }
}

/// Search request body. A missing `query` is treated like a blank one.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<NormalizedRecord>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub searches: Vec<SearchQuery>,
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| AffilscanError::Validation(e.body_text()))?;
    let query = req.query.unwrap_or_default();
    info!(query = %query, "Search request");
    let results = state.service.search(&query).await?;
    Ok(Json(ResultsResponse { results }))
}

async fn history_handler(
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let searches = state.service.history()?;
    Ok(Json(HistoryResponse { searches }))
}

async fn results_handler(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Result<Json<ResultsResponse>, ApiError> {
    // Ids are integers; anything else cannot own records.
    let Ok(search_id) = search_id.parse::<i64>() else {
        return Ok(Json(ResultsResponse {
            results: Vec::new(),
        }));
    };
    let results = state.service.results(search_id)?;
    Ok(Json(ResultsResponse { results }))
}
