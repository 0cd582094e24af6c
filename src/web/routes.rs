use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::db::{
    count_posts, count_posts_by_group, count_unnotified_posts, get_post_by_post_id, ScrapedPost,
};
use crate::notify;
use crate::query::{self, PostFilters, DEFAULT_LIMIT};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ingest", post(ingest_posts))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/:post_id", get(post_detail))
        .route("/api/posts/:post_id/notified", post(mark_notified))
        .route("/api/stats", get(stats))
        .route("/healthz", get(health))
}

// ========== Ingestion (scraper collaborator) ==========

async fn ingest_posts(
    State(state): State<AppState>,
    Json(posts): Json<Vec<ScrapedPost>>,
) -> Response {
    match state.repo.ingest_batch(&posts).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!("Ingestion failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Ingestion error").into_response()
        }
    }
}

// ========== Query endpoint (dashboard) ==========

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
    group: Option<String>,
    search: Option<String>,
    only_new: Option<bool>,
    category: Option<String>,
    location: Option<String>,
}

async fn list_posts(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let filters = PostFilters {
        group: params.group.filter(|s| !s.is_empty()),
        search: params.search.filter(|s| !s.is_empty()),
        only_new: params.only_new.unwrap_or(false),
        category: params.category.filter(|s| !s.is_empty()),
        location: params.location.filter(|s| !s.is_empty()),
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    match query::query_posts(state.db.pool(), &filters, limit, offset).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => {
            tracing::error!("Failed to query posts: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

// ========== Single-post lookup ==========

async fn post_detail(State(state): State<AppState>, Path(post_id): Path<String>) -> Response {
    match get_post_by_post_id(state.db.pool(), &post_id).await {
        Ok(Some(post)) => Json(post).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Failed to fetch post: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

// ========== Notification callback (sender collaborator) ==========

async fn mark_notified(State(state): State<AppState>, Path(post_id): Path<String>) -> Response {
    match notify::mark_notified(state.db.pool(), &post_id).await {
        Ok(true) => Json(json!({ "post_id": post_id, "notified": true })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Failed to mark post notified: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

// ========== Stats ==========

async fn stats(State(state): State<AppState>) -> Response {
    let total = match count_posts(state.db.pool()).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to count posts: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let new = match count_unnotified_posts(state.db.pool()).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to count unnotified posts: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let by_group = match count_posts_by_group(state.db.pool()).await {
        Ok(groups) => groups,
        Err(e) => {
            tracing::error!("Failed to count posts by group: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    Json(json!({ "total": total, "new": new, "by_group": by_group })).into_response()
}

// ========== Health ==========

async fn health() -> &'static str {
    "ok"
}
