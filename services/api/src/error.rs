//! Error helpers for the API service

use common::error::{ActionError, StoreError};
use tracing::error;

pub use common::error::GENERIC_FAILURE;

/// Type alias for API results
pub type ApiResult<T> = Result<T, ActionError>;

/// Log a failed store call for `action` and translate it for the caller
///
/// Store-reported failures keep their status and message; anything else
/// becomes a 500 carrying `fallback`.
pub fn store_failure(action: &'static str, fallback: &'static str) -> impl FnOnce(StoreError) -> ActionError {
    move |err| {
        error!("{} failed: {}", action, err);
        ActionError::from_store(err, fallback)
    }
}
