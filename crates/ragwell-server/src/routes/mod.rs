//! HTTP route handlers.

pub mod embeddings;
pub mod stats;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(stats::routes())
        .merge(embeddings::routes())
}

/// Map a service error to a status code and JSON body.
///
/// Unknown models are permanent; backend failures are worth retrying.
pub(crate) fn error_response(err: ragwell_core::Error) -> (StatusCode, Json<serde_json::Value>) {
    use ragwell_core::Error;

    let (status, message) = match &err {
        Error::ModelNotFound(_) => (StatusCode::NOT_FOUND, "Model unavailable".to_string()),
        Error::InvalidModelKey(_) => (StatusCode::BAD_REQUEST, "Invalid model key".to_string()),
        e if e.is_transient() => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Embedding service temporarily unavailable, try again".to_string(),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
    };

    if status.is_server_error() {
        tracing::warn!("{}", err);
    }

    (
        status,
        Json(serde_json::json!({
            "error": message,
            "detail": err.to_string(),
        })),
    )
}

/// Same `{error, detail}` body for request bodies axum could not extract.
pub(crate) fn rejection_response(rejection: JsonRejection) -> (StatusCode, Json<serde_json::Value>) {
    (
        rejection.status(),
        Json(serde_json::json!({
            "error": "Invalid request body",
            "detail": rejection.body_text(),
        })),
    )
}

/// Router over a small in-memory backend plus a request helper.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ragwell_core::{DataPaths, EmbeddingConfig, RagwellConfig};
    use ragwell_infer::{Embedding, ModelBackend, ModelHandle};
    use tower::ServiceExt;

    /// Loads anything except mpnet models; vectors start with the text length.
    pub(crate) struct EchoBackend;
    struct EchoModel;

    impl ModelBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        fn load(&self, model_name: &str) -> Result<Box<dyn ModelHandle>, String> {
            if model_name.contains("mpnet") {
                return Err("weights missing".into());
            }
            Ok(Box::new(EchoModel))
        }
    }

    impl ModelHandle for EchoModel {
        fn encode_one(&self, text: &str) -> Result<Embedding, String> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    pub(crate) fn app() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = RagwellConfig {
            port: 0,
            data_paths: DataPaths::new(dir.path()).unwrap(),
            embedding: EmbeddingConfig {
                worker_pool_size: 2,
                ..EmbeddingConfig::default()
            },
        };
        let state = Arc::new(AppState::new(config, Arc::new(EchoBackend)));
        (build_router(state), dir)
    }

    pub(crate) async fn call(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        send(app, method, uri, body.map(|json| ("application/json", json.to_string()))).await
    }

    /// Like `call`, with an arbitrary content type and raw body.
    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<(&str, String)>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some((content_type, raw)) => builder
                .header("content-type", content_type)
                .body(Body::from(raw))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
