use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use ollama_gateway::config::{Cli, Config};
use ollama_gateway::inference::client::OllamaFactory;
use ollama_gateway::server::openai_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "ollama_gateway=debug,tower_http=debug"
    } else {
        "ollama_gateway=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("ollama-gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        backend = %config.backend.base_url,
        default_model = %config.backend.default_model,
        timeout_secs = ?config.backend.timeout_secs,
        chunk_words = config.streaming.chunk_words,
        chunk_delay_ms = config.streaming.chunk_delay_ms,
        "Configuration loaded"
    );

    // Build application state around the Ollama client factory.
    let factory = Arc::new(OllamaFactory::new(config.backend.clone()));
    let state = Arc::new(AppState::new(config.clone(), factory)?);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
