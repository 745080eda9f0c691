use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use danmu_hub::api;
use danmu_hub::config::AppConfig;
use danmu_hub::engine::DanmuEngine;
use danmu_hub::logging;

#[tokio::main]
async fn main() {
    // .env is optional; missing files are fine.
    let _ = dotenvy::dotenv();
    logging::init();

    let config = AppConfig::from_env_or_default();
    let engine = match DanmuEngine::from_config(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("failed to build engine: {e}");
            std::process::exit(1);
        }
    };

    // Warm local state from the durable mirror before accepting traffic.
    engine.sync_from_mirror().await;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    if let Err(e) = api::serve(engine, shutdown).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
