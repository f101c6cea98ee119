use anyhow::Result;
use clap::Parser;
use formwright::config::Config;
use formwright::server::{build_router, AppState};
use formwright::telemetry;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    let config = Config::parse();

    let generator = config.generator();
    match &generator {
        Some(client) => info!(backend = %client.describe(), "question generation enabled"),
        None => warn!("GEMINI_API_KEY not set; question generation is disabled"),
    }

    let store = config.store();
    if store.memory().is_some() {
        info!("FIREBASE_DATABASE_URL not set; published forms are kept in memory");
    }

    let state = AppState::new(generator, store, config.public_base_url());
    let app = build_router(state, &config.static_dir);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, static_dir = %config.static_dir.display(), "formwright listening");
    info!("frontend at {}/", config.public_base_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
