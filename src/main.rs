use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scoreboard_server::{api, storage, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scoreboard_server=info,tower_http=info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = ServerConfig::from_env();
    info!("Starting scoreboard server v{}", env!("CARGO_PKG_VERSION"));

    // Schema is created (once) before the listener is bound.
    let storage = match storage::init_storage(
        &config.database_url,
        config.max_connections,
        config.acquire_timeout,
    )
    .await
    {
        Ok(storage) => storage,
        Err(e) => {
            error!("Storage initialization failed: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = api::start_api_server(storage, &config).await {
        error!("API server error: {}", e);
        return Err(anyhow::anyhow!(e));
    }

    info!("Server stopped");
    Ok(())
}
