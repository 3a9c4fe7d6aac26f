//! Session tokens
//!
//! A session is an HS256 JWT issued at login. It carries the user id and the
//! record-store token, which is all an action needs to attribute and
//! authorize a mutation.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{error::ActionError, identity::Identity, store::RecordId};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secret used to sign session tokens
    pub secret: String,
    /// Session lifetime in seconds (default: 7 days)
    pub ttl_seconds: u64,
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_SECRET`: Signing secret (required)
    /// - `SESSION_TTL_SECONDS`: Session lifetime in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("SESSION_SECRET")
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET environment variable not set"))?;
        if secret.trim().is_empty() {
            anyhow::bail!("SESSION_SECRET must not be empty");
        }

        let ttl_seconds = std::env::var("SESSION_TTL_SECONDS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse()
            .unwrap_or(604800);

        Ok(SessionConfig {
            secret,
            ttl_seconds,
        })
    }
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: RecordId,
    /// Token for the record store
    pub store_token: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("system clock is before the unix epoch")]
    Clock,
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl_seconds: config.ttl_seconds,
        }
    }

    /// Issue a session token for `identity`
    pub fn issue(&self, identity: &Identity) -> Result<String, SessionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SessionError::Clock)?
            .as_secs();

        let claims = Claims {
            sub: identity.user_id().clone(),
            store_token: identity.store_token().to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify `token` and recover the identity it was issued for
    pub fn verify(&self, token: &str) -> Result<Identity, SessionError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(Identity::new(data.claims.sub, data.claims.store_token))
    }
}

/// Reject requests without a valid bearer session; otherwise attach its [`Identity`]
pub async fn require_session(
    State(keys): State<SessionKeys>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ActionError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ActionError::Unauthorized)?;

    let identity = keys.verify(bearer.token()).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ActionError::Unauthorized
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ActionError::Unauthorized)
    }
}
