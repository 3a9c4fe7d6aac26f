//! Errors of the account actions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{
    error::{ActionError, GENERIC_FAILURE, StoreError},
    session::SessionError,
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::error;

/// Form fields never echoed back to the client
const SECRET_FIELDS: [&str; 3] = ["password", "passwordConfirm", "oldPassword"];

/// Type alias for account action results
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The store refused the email/password pair
    #[error("invalid credentials")]
    InvalidCredentials { data: Map<String, Value> },

    /// The account exists but its email was never confirmed
    #[error("account email not verified")]
    NotVerified { data: Map<String, Value> },

    #[error("failed to issue session: {0}")]
    Session(#[from] SessionError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Action(err) => err.status(),
            AuthError::InvalidCredentials { .. } => StatusCode::BAD_REQUEST,
            AuthError::NotVerified { .. } => StatusCode::FORBIDDEN,
            AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AuthError::Action(err) => return err.into_response(),
            AuthError::InvalidCredentials { data } => json!({
                "data": data,
                "invalidCredentials": true,
            }),
            AuthError::NotVerified { data } => json!({
                "data": data,
                "notVerified": true,
            }),
            AuthError::Session(err) => {
                error!("Session issuance failed: {}", err);
                json!({ "error": GENERIC_FAILURE })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Drop secrets from a re-displayable submission
pub fn without_secrets(mut data: Map<String, Value>) -> Map<String, Value> {
    for field in SECRET_FIELDS {
        data.remove(field);
    }
    data
}

/// Validation failures echo the submission without its secrets
pub fn redact(err: ActionError) -> ActionError {
    match err {
        ActionError::Invalid { data, errors } => ActionError::Invalid {
            data: without_secrets(data),
            errors,
        },
        other => other,
    }
}

/// Log a failed store call for `action` and translate it for the caller
pub fn store_failure(action: &'static str) -> impl FnOnce(StoreError) -> AuthError {
    move |err| {
        error!("{} failed: {}", action, err);
        AuthError::Action(ActionError::from_store(err, GENERIC_FAILURE))
    }
}
