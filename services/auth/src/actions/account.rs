//! Registration, login and password reset

use common::{
    form::FormData,
    identity::{Caller, Identity},
    session::SessionKeys,
    store::{AccountStore, Collection, Payload},
    validation::{
        parse,
        schemas::user::{LOGIN_USER, REGISTER_USER, RESET_PASSWORD},
    },
};
use rand::Rng;
use tracing::{error, info, warn};

use crate::{
    error::{AuthError, AuthResult, redact, store_failure, without_secrets},
    models::{LoginResponse, Success},
};

/// Letters of the name kept in a generated username
const USERNAME_PREFIX_LEN: usize = 5;

/// Lowercased leading letters of `name` followed by four random digits
pub fn derive_username(name: &str, rng: &mut impl Rng) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(USERNAME_PREFIX_LEN)
        .collect::<String>()
        .to_lowercase();
    format!("{prefix}{:04}", rng.gen_range(0..10_000))
}

/// Create an account and ask the store to send its verification mail
pub async fn register(store: &dyn AccountStore, form: &FormData) -> AuthResult<Success> {
    let registration = parse(&REGISTER_USER, form).map_err(redact)?;
    let username = derive_username(&registration.name, &mut rand::thread_rng());
    info!("Registering user {}", username);

    let payload = Payload::new()
        .text("name", registration.name)
        .text("email", registration.email.as_str())
        .text("password", registration.password)
        .text("passwordConfirm", registration.password_confirm)
        .text("username", username);
    store
        .create(Caller::Anonymous, Collection::Users, payload)
        .await
        .map_err(store_failure("register"))?;

    store
        .request_verification(&registration.email)
        .await
        .map_err(store_failure("request_verification"))?;

    Ok(Success::ok())
}

/// Authenticate with email and password and issue a session
pub async fn login(
    store: &dyn AccountStore,
    sessions: &SessionKeys,
    form: &FormData,
) -> AuthResult<LoginResponse> {
    let credentials = parse(&LOGIN_USER, form).map_err(redact)?;

    let session = store
        .auth_with_password(&credentials.email, &credentials.password)
        .await
        .map_err(|err| match err.status() {
            Some(400) => {
                info!("Rejected login attempt");
                AuthError::InvalidCredentials {
                    data: without_secrets(form.echo()),
                }
            }
            _ => store_failure("login")(err),
        })?;

    if !session.record.flag("verified") {
        warn!("Login by unverified user {}", session.record.id);
        return Err(AuthError::NotVerified {
            data: without_secrets(form.echo()),
        });
    }

    let identity = Identity::new(session.record.id, session.token);
    let token = sessions.issue(&identity).map_err(|e| {
        error!("Failed to issue session for {}: {}", identity.user_id(), e);
        e
    })?;
    info!("User {} logged in", identity.user_id());

    Ok(LoginResponse { token })
}

/// Ask the store to mail a password reset link
pub async fn reset_password(store: &dyn AccountStore, form: &FormData) -> AuthResult<Success> {
    let target = parse(&RESET_PASSWORD, form)?;
    info!("Password reset requested");

    store
        .request_password_reset(&target.email)
        .await
        .map_err(store_failure("reset_password"))?;

    Ok(Success::ok())
}
