use anyhow::Result;
use greenlight::config::Config;
use greenlight::config_validator::ConfigValidator;
use greenlight::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env();

    // One JSON object per line in production, human-readable otherwise.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("greenlight={},tower_http=debug", config.log_level).into()),
        )
        .with(config.is_production().then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.is_production()).then(tracing_subscriber::fmt::layer))
        .init();

    ConfigValidator::validate(&config)?;

    tracing::info!("Starting greenlight {} service", config.env);
    tracing::info!(
        "Configuration: port={}, limiter_enabled={}, limiter_rps={}, limiter_burst={}",
        config.port,
        config.limiter_enabled,
        config.limiter_rps,
        config.limiter_burst
    );

    let server = Server::new(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
