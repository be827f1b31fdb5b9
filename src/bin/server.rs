use anyhow::Result;
use arrowhaul::config::AppConfig;
use arrowhaul::http::app_server::AppServer;
use arrowhaul::TransferEngine;
use clap::Parser;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "arrowhaul-server", about = "Arrowhaul HTTP Server")]
struct Cli {
    /// Path to config file
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Arrowhaul HTTP Server");

    let config = AppConfig::load(&cli.config)?;
    config.validate()?;

    tracing::info!("Configuration '{}' loaded successfully", &cli.config);

    // Pools connect lazily: an unreachable database surfaces on first use
    let engine = TransferEngine::from_config(&config)?;

    tracing::info!(
        "Engine initialized with base dir '{}'",
        config.local.base_dir
    );

    let app = AppServer::new(engine);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server started in {}ms", now.elapsed().as_millis());
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.router).await?;

    Ok(())
}
