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
    session::{SessionConfig, SessionKeys},
    store::{
        AccountStore,
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

    info!("Starting authentication service");

    // Record store holding the users collection
    let store_config = RecordStoreConfig::from_env()?;
    let store: Arc<dyn AccountStore> = if store_config.is_memory() {
        warn!("Using the in-memory record store; accounts are lost on restart");
        Arc::new(InMemoryStore::new())
    } else {
        info!("Using record store at {}", store_config.url);
        Arc::new(HttpRecordStore::new(&store_config)?)
    };

    let sessions = SessionKeys::new(&SessionConfig::from_env()?);

    let app_state = AppState { store, sessions };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
