//! Floportop HTTP server.
//!
//! Warms the model artifacts, publishes a persisted search index if one
//! exists, then serves the prediction and search API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::{AppContext, AppState, SearchService, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "floportop-server", version, about = "Movie rating prediction and similar-film search")]
struct Args {
    #[command(flatten)]
    config: ServiceConfig,

    /// Address to listen on
    #[arg(long, env = "FLOPORTOP_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug,similarity=debug,features=debug")),
        )
        .init();

    let args = Args::parse();
    info!("Starting Floportop server (app root {:?})", args.config.app_root);

    let ctx = Arc::new(AppContext::new(args.config));

    // Startup loads are best effort; whatever fails is retried on first use
    info!("Warming model artifacts...");
    let warm_ctx = Arc::clone(&ctx);
    let failures = tokio::task::spawn_blocking(move || warm_ctx.warm())
        .await
        .context("artifact warm-up task panicked")?;
    for (name, err) in &failures {
        warn!("Could not load {}: {}", name, err);
    }

    match SearchService::new(Arc::clone(&ctx)).load_persisted().await {
        Ok(Some(size)) => info!("Search index ready with {} movies", size),
        Ok(None) => warn!("No search index yet; call POST /rebuild-index"),
        Err(e) => warn!("Failed to load persisted search index: {}", e),
    }

    let app = server::router(AppState::new(ctx));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("Listening on http://{}", args.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
