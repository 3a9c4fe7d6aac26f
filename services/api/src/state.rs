//! Application state shared across handlers

use std::sync::Arc;

use common::{lock::KeyedLock, session::SessionKeys, store::RecordStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub vote_lock: Arc<dyn KeyedLock>,
    pub sessions: SessionKeys,
}
