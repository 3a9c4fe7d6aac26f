//! Error types shared by the showcase services
//!
//! `StoreError` describes failures reported by the record store adapters.
//! `ActionError` is the taxonomy every action surfaces at its HTTP boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{form::DecodeError, validation::FieldErrors};

/// Fallback message for failures that must not leak internal details.
pub const GENERIC_FAILURE: &str = "Something went wrong";

/// Failure reported by (or while talking to) the record store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the operation with an HTTP-style status
    #[error("record store responded {status}: {message}")]
    Response { status: u16, message: String },

    /// The store could not be reached or the request did not complete
    #[error("record store transport error: {0}")]
    Transport(String),

    /// The store answered with a body we could not interpret
    #[error("unexpected record store payload: {0}")]
    Payload(String),
}

impl StoreError {
    /// Store-reported failure with the given status and message
    pub fn response(status: u16, message: impl Into<String>) -> Self {
        StoreError::Response {
            status,
            message: message.into(),
        }
    }

    /// The canonical "missing or not visible to you" failure
    pub fn not_found() -> Self {
        Self::response(404, "The requested resource wasn't found.")
    }

    /// Status carried by a store-reported failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Error surfaced by an action handler
#[derive(Error, Debug)]
pub enum ActionError {
    /// The submission could not be decoded at all
    #[error("malformed submission: {0}")]
    Decode(#[from] DecodeError),

    /// One or more field constraints failed
    #[error("submission failed validation on {} field(s)", errors.len())]
    Invalid {
        data: Map<String, Value>,
        errors: FieldErrors,
    },

    /// No authenticated identity was available
    #[error("Unauthorized")]
    Unauthorized,

    /// The record store rejected the operation; status and message are forwarded
    #[error("{message}")]
    Store { status: StatusCode, message: String },

    /// Anything else, reported with a fixed message
    #[error("{0}")]
    Internal(&'static str),
}

impl ActionError {
    /// Translate a store failure, using `fallback` for anything the store did not report itself
    pub fn from_store(err: StoreError, fallback: &'static str) -> Self {
        match err {
            StoreError::Response { status, message } => match StatusCode::from_u16(status) {
                Ok(status) => ActionError::Store { status, message },
                Err(_) => ActionError::Internal(fallback),
            },
            StoreError::Transport(_) | StoreError::Payload(_) => ActionError::Internal(fallback),
        }
    }

    /// HTTP status this error is rendered with
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Decode(_) | ActionError::Invalid { .. } => StatusCode::BAD_REQUEST,
            ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
            ActionError::Store { status, .. } => *status,
            ActionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        ActionError::from_store(err, GENERIC_FAILURE)
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ActionError::Decode(_) => json!({ "error": "Malformed submission" }),
            ActionError::Invalid { data, errors } => json!({
                "data": data,
                "errors": errors,
            }),
            ActionError::Unauthorized => json!({ "error": "Unauthorized" }),
            ActionError::Store { message, .. } => json!({ "error": message }),
            ActionError::Internal(message) => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
