use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trainwatch::{Config, ScanCoordinator, Store, TrainPipeline, ViaggiaTrenoClient};

const CONFIG_ENV: &str = "TRAINWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "trainwatch.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr, stdout carries one line per train
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trainwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    info!(database = %config.database_url, "Opening train database");
    let max_connections = u32::try_from(config.workers).unwrap_or(u32::MAX);
    let store = Store::open(&config.database_url, max_connections).await?;
    if config.reset_on_start {
        store.init_schema().await?;
    } else {
        store.ensure_schema().await?;
    }

    let client = ViaggiaTrenoClient::new(
        config.listing_url.clone(),
        config.detail_url.clone(),
        config.request_timeout(),
    )?;
    let pipeline = Arc::new(TrainPipeline::new(Arc::new(client), store.clone()));
    let coordinator = ScanCoordinator::new(pipeline, config.workers);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing trains already in progress");
            ctrl_c_cancel.cancel();
        }
    });

    coordinator
        .run(config.train_range(), cancel, |outcome| println!("{}", outcome))
        .await;

    store.close().await;
    Ok(())
}
