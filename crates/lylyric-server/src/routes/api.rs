//! JSON API: status, lookup, similarity and completion settings.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;
use lylyric_chat::LLMConfigUpdate;
use lylyric_core::{Error, SongRecord};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/lookup", post(lookup))
        .route("/similar", post(similar))
        .route("/completion/config", get(get_config).put(update_config))
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub query: String,
}

/// Map an error to its HTTP status and `{"error": ...}` body.
fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Warehouse(_) | Error::Search(_) | Error::Completion(_) | Error::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("API request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

// ---------------------------------------------------------------
// Status
// ---------------------------------------------------------------

/// GET /api/status: backends, row counts and completion provider.
async fn get_status(State(app): State<Arc<AppState>>) -> Json<Value> {
    let orch = &app.orchestrator;

    let songs = match orch.warehouse().count_songs().await {
        Ok(n) => json!(n),
        Err(e) => {
            warn!("Row count unavailable: {}", e);
            Value::Null
        }
    };
    let completion = app.llm_config.read().to_response();

    let mut status = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "warehouse": orch.warehouse().name(),
        "search": orch.search_service().name(),
        "table": app.config.table,
        "songs": songs,
        "similarLimit": orch.similar_limit(),
        "completion": {
            "provider": completion.active_provider,
            "model": orch.completion().model(),
        },
        "sessions": app.sessions.len(),
    });

    if let Some(store) = &app.local_store {
        match store.get_stats().await {
            Ok(stats) => {
                status["totalArtists"] = json!(stats.total_artists);
                status["dbSizeMb"] = json!(stats.db_size_mb);
            }
            Err(e) => warn!("Store stats unavailable: {}", e),
        }
    }

    Json(status)
}

// ---------------------------------------------------------------
// Lookup / similar
// ---------------------------------------------------------------

/// POST /api/lookup: `{"query": "..."}` → `{"found": bool, "song": ...}`.
async fn lookup(State(app): State<Arc<AppState>>, Json(req): Json<LookupRequest>) -> Response {
    match app.orchestrator.lookup(&req.query).await {
        Ok(song) => Json(json!({ "found": song.is_some(), "song": song })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/similar: a song record → `{"results": [...]}`.
async fn similar(State(app): State<Arc<AppState>>, Json(song): Json<SongRecord>) -> Response {
    match app.orchestrator.similar(&song).await {
        Ok(results) => Json(json!({ "results": results })).into_response(),
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------
// Completion config
// ---------------------------------------------------------------

async fn get_config(State(app): State<Arc<AppState>>) -> Response {
    let config = app.llm_config.read();
    Json(config.to_response()).into_response()
}

async fn update_config(
    State(app): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> Response {
    let snapshot = {
        let mut config = app.llm_config.write();
        if let Err(e) = config.apply_update(&update) {
            return error_response(&e);
        }
        config.clone()
    };

    let saved = tokio::task::spawn_blocking(move || snapshot.save().map(|_| snapshot))
        .await
        .map_err(|e| Error::Internal(e.to_string()))
        .and_then(|r| r);
    match saved {
        Ok(config) => Json(config.to_response()).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to save config: {}", e) })),
        )
            .into_response(),
    }
}
