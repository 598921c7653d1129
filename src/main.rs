// Woodchuck - main.rs
// Bootstrap runner: load config, open the log store, resume ids, serve HTTP

use std::net::SocketAddr;
use std::process::exit;

use anyhow::Context;
use woodchuck::app_state::AppState;
use woodchuck::config::{load_dotenv, WoodchuckConfig};
use woodchuck::ingest::IngestService;
use woodchuck::live_feed::LiveFeed;
use woodchuck::logging::init_tracing;
use woodchuck::open_store;
use woodchuck::web::build_router;

#[tokio::main]
async fn main() {
    let dotenv = match load_dotenv() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Failed to load .env: {e}");
            exit(1);
        }
    };

    let config = match WoodchuckConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            exit(1);
        }
    };

    init_tracing(config.log_format);
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "woodchuck stopped");
        exit(1);
    }
}

async fn run(config: WoodchuckConfig) -> anyhow::Result<()> {
    let store = open_store(&config).context("failed to initialize log store")?;
    let feed = config.live_feed.then(|| LiveFeed::new(config.feed_capacity));
    let ingest = IngestService::recover(store, feed)
        .await
        .context("failed to seed log ids")?;

    let app = build_router(AppState::new(ingest));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        addr = %addr,
        backend = ?config.backend,
        live_feed = config.live_feed,
        "listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
