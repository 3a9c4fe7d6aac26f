use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod actions;
mod error;
mod models;
mod routes;
mod state;

use common::{
    cache::{RedisConfig, RedisPool},
    lock::{KeyedLock, LocalLock, LockConfig, RedisLock},
    session::{SessionConfig, SessionKeys},
    store::{
        RecordStore,
        http::{HttpRecordStore, RecordStoreConfig},
        memory::InMemoryStore,
    },
};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting API service");

    // Record store
    let store_config = RecordStoreConfig::from_env()?;
    let store: Arc<dyn RecordStore> = if store_config.is_memory() {
        warn!("Using the in-memory record store; data is lost on restart");
        Arc::new(InMemoryStore::new())
    } else {
        info!("Using record store at {}", store_config.url);
        Arc::new(HttpRecordStore::new(&store_config)?)
    };

    // Vote lock, shared through Redis when configured
    let lock_config = LockConfig::from_env()?;
    let vote_lock: Arc<dyn KeyedLock> = match RedisConfig::from_env()?.url {
        Some(url) => {
            let pool = RedisPool::new(&url).await?;
            if pool.health_check().await? {
                info!("Redis connection successful");
            } else {
                anyhow::bail!("Failed to connect to Redis");
            }
            Arc::new(RedisLock::new(pool, &lock_config))
        }
        None => {
            info!("REDIS_URL not set, votes are serialized in process only");
            Arc::new(LocalLock::new(&lock_config))
        }
    };

    let sessions = SessionKeys::new(&SessionConfig::from_env()?);

    let app_state = AppState {
        store,
        vote_lock,
        sessions,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
