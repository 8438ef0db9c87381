//! Health and server info routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health — liveness plus a summary of the embedding service.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.embeddings.stats();

    Json(serde_json::json!({
        "status": "healthy",
        "service": "ragwell",
        "version": env!("CARGO_PKG_VERSION"),
        "hostname": hostname(),
        "port": state.config.port,
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "activeModel": stats.active_model,
        "loadedModels": stats.loaded_models.len(),
        "checkedAt": chrono::Utc::now().to_rfc3339(),
    }))
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("hostname")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
    #[cfg(not(unix))]
    {
        "unknown".to_string()
    }
}
