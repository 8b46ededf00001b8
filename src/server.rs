//! HTTP search endpoint.
//!
//! A thin JSON layer over the hybrid retrieval engine, for frontends and
//! other services.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/search?query=…` | Hybrid search, `{ "result": [...] }` |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! Errors come back as `{ "error": { "code": "internal", "message": … } }`
//! with status 500. All origins are permitted: the search endpoint is
//! read-only and meant to be called from browser frontends.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::search::HybridSearchEngine;

#[derive(Clone)]
struct AppState {
    engine: Arc<HybridSearchEngine>,
}

/// Start the HTTP server and serve until the process is terminated.
pub async fn run_server(bind: &str, engine: Arc<HybridSearchEngine>) -> anyhow::Result<()> {
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", get(search_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "search endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.engine.search(&params.query).await {
        Ok(results) => Json(serde_json::json!({ "result": results })).into_response(),
        Err(e) => {
            error!(error = %e, "search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": { "code": "internal", "message": e.to_string() }
                })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
