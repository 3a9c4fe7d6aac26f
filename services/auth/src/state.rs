//! Application state shared across handlers

use std::sync::Arc;

use common::{session::SessionKeys, store::AccountStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub sessions: SessionKeys,
}
