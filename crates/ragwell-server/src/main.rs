//! Ragwell — document retrieval backend; serves embedding model management
//! and text embedding over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RAGWELL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                println!("Ragwell — embedding and retrieval server");
                println!();
                println!("Usage: ragwell");
                println!();
                println!("Environment:");
                println!("  RAGWELL_DATA_DIR         Data directory (models in <dir>/models)");
                println!("  PORT                     HTTP port (default 3003)");
                println!("  RAGWELL_EMBEDDING_MODEL  Default model key");
                println!("  RAGWELL_CACHE_SIZE       Embedding cache capacity");
                println!("  RAGWELL_CACHE_TTL_SECS   Embedding cache TTL");
                println!("  RAGWELL_WORKERS          Model worker pool size");
                println!("  RAGWELL_BATCH_SIZE       Default encode batch size");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ragwell help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = ragwell_core::RagwellConfig::from_env(&data_dir)?;
    let port = config.port;

    let backend = ragwell_infer::create_backend(&config.data_paths.models);
    let state = Arc::new(AppState::new(config, backend));

    let app = routes::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ragwell server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.embeddings.cleanup();
    info!("Embedding service stopped");

    Ok(())
}
