use std::sync::Arc;
use std::time::Duration;
use headtohead::api;
use headtohead::cache::MemoryKv;
use headtohead::pubsub::LocalPubSub;
use headtohead::sqlite_store::SqliteStore;
use headtohead::uploader::FsUploader;
use headtohead::{Config, GameManager};
use tracing_subscriber::EnvFilter;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let addr = config.addr;

    let games = Arc::new(SqliteStore::open(&config.db_path)?);
    let kv = Arc::new(MemoryKv::new());
    let pubsub = Arc::new(LocalPubSub::new(config.channel_capacity));
    let uploader = Arc::new(FsUploader::new(config.upload_dir.clone(), config.public_url.clone()));
    let game_manager = GameManager::new(config, games, kv.clone(), pubsub, uploader);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match kv.purge_expired() {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired puzzles swept"),
                Err(err) => tracing::warn!(error = %err, "cache sweep failed"),
            }
        }
    });

    let app = api::router(game_manager);

    tracing::info!(%addr, "head-to-head server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
