use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopdeck::config::Config;
use shopdeck::storage::MediaStore;
use shopdeck::token::TokenService;
use shopdeck::AppState;

#[derive(Parser, Debug)]
#[command(name = "shopdeck")]
#[command(author, version, about = "Multi-tenant storefront administration API", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "shopdeck.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Shopdeck v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database
    let db = shopdeck::db::init(&config.server.data_dir).await?;

    // Token service signs session cookies
    let tokens = TokenService::new(
        config.auth.signing_secret(),
        chrono::Duration::days(config.auth.token_ttl_days),
    );

    // Media storage for logos and product images
    let media = MediaStore::new(&config.server.data_dir, &config.server.public_url)?;
    let media_root = media.root().to_path_buf();

    let state = Arc::new(AppState::new(config.clone(), db, tokens, media));

    // API routes plus static media serving
    let app = shopdeck::api::create_router(state)
        .nest_service("/media", ServeDir::new(&media_root));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
