//! Embedding model routes — model catalogue, switching, embedding, benchmark.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{error_response, rejection_response};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Models
        .route("/embeddings/models", get(list_models))
        .route("/embeddings/models/active", get(get_active_model))
        .route("/embeddings/models/switch", post(switch_model))
        .route("/embeddings/models/{key}", get(get_model))
        .route("/embeddings/models/{key}/load", post(load_model))
        .route("/embeddings/benchmark", post(benchmark))
        // Embedding
        .route("/embeddings/embed", post(embed))
        .route("/embeddings/embed/batch", post(embed_batch))
        .route("/embeddings/stats", get(get_stats))
}

// ---------------------------------------------------------------
// Models
// ---------------------------------------------------------------

async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models = state.embeddings.list_models();
    let active = state
        .embeddings
        .active_model()
        .map(|m| m.descriptor.key);
    Json(serde_json::json!({
        "models": models,
        "active": active,
        "total": models.len(),
    }))
}

async fn get_active_model(State(state): State<Arc<AppState>>) -> Response {
    match state.embeddings.active_model() {
        Some(model) => Json(model).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "No active model",
                "default": state.embeddings.config().default_model,
            })),
        )
            .into_response(),
    }
}

async fn get_model(State(state): State<Arc<AppState>>, Path(key): Path<String>) -> Response {
    match state.embeddings.get_model(&key) {
        Ok(model) => Json(model).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Deserialize)]
struct LoadParams {
    #[serde(default)]
    force: bool,
}

async fn load_model(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<LoadParams>,
) -> Response {
    match state.embeddings.load_model(&key, params.force).await {
        Ok(model) => Json(serde_json::json!({
            "success": true,
            "model": model,
        }))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Deserialize)]
struct SwitchRequest {
    model: String,
}

async fn switch_model(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SwitchRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejection_response(rejection).into_response(),
    };
    match state.embeddings.switch_model(&req.model).await {
        Ok(model) => Json(serde_json::json!({
            "success": true,
            "model": model,
            "message": format!("Switched to {}", model.descriptor.name),
        }))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Deserialize, Default)]
struct BenchmarkRequest {
    texts: Option<Vec<String>>,
    models: Option<Vec<String>>,
}

/// The body is optional; without one every model runs on the built-in texts.
async fn benchmark(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BenchmarkRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => BenchmarkRequest::default(),
        Err(rejection) => return rejection_response(rejection).into_response(),
    };
    let report = state.embeddings.benchmark(req.texts, req.models).await;
    Json(report).into_response()
}

// ---------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------

#[derive(Deserialize)]
struct EmbedRequest {
    text: String,
    model: Option<String>,
}

async fn embed(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejection_response(rejection).into_response(),
    };
    match state.embeddings.embed(&req.text, req.model.as_deref()).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Deserialize)]
struct EmbedBatchRequest {
    texts: Vec<String>,
    model: Option<String>,
    batch_size: Option<usize>,
}

async fn embed_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbedBatchRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejection_response(rejection).into_response(),
    };
    match state
        .embeddings
        .embed_batch(&req.texts, req.model.as_deref(), req.batch_size)
        .await
    {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ragwell_infer::ServiceStats> {
    Json(state.embeddings.stats())
}
