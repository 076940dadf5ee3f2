use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use agri_advisor::{AdvisorService, Config, handlers};

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let bind = config.server.bind.clone();

    let service = AdvisorService::new(config)?;
    let router = handlers::router(service);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "Starting agriculture advisor HTTP server");

    axum::serve(listener, router).await?;
    tracing::info!("main: Server shut down");
    Ok(())
}
