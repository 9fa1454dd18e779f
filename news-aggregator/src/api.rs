use crate::registry::SourceRegistry;
use crate::scheduler::RefreshScheduler;
use crate::store::NewsStore;
use crate::types::{NewsPage, RefreshOutcome, SourceDescriptor};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<RefreshScheduler>,
    pub store: NewsStore,
    pub registry: SourceRegistry,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(list_news))
        .route("/api/sources", get(list_sources))
        .route("/api/refresh", post(refresh))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

async fn list_news(
    State(state): State<AppState>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    if offset < 0 {
        return Err(ApiError::bad_request("offset must not be negative"));
    }

    debug!("Listing news (limit={}, offset={})", limit, offset);

    let page = state.store.page(limit, offset).await.map_err(|e| {
        error!("Failed to read news items: {}", e);
        ApiError::internal(e.to_string())
    })?;
    Ok(Json(page))
}

#[derive(Debug, Serialize)]
struct SourcesResponse {
    sources: Vec<SourceDescriptor>,
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state.registry.load().map_err(|e| {
        error!("Failed to load sources: {}", e);
        ApiError::internal(e.to_string())
    })?;
    Ok(Json(SourcesResponse { sources }))
}

// Always 200: a failed cycle is reported in the body.
async fn refresh(State(state): State<AppState>) -> Json<RefreshOutcome> {
    Json(state.scheduler.refresh_now().await)
}
