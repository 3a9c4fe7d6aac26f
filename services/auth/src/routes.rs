//! Authentication service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::{form::FormData, identity::Identity, session::require_session};

use crate::{
    actions::{account, profile},
    error::AuthResult,
    state::AppState,
};

/// Largest request body accepted; avatars are at most a few megabytes
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/account/profile", post(update_profile))
        .route("/account/username", post(update_username))
        .route("/account/email", post(update_email))
        .route("/account/password", post(update_password))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/reset-password", post(reset_password))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let success = account::register(state.store.as_ref(), &form).await?;
    Ok(Json(success))
}

/// User login endpoint
pub async fn login(State(state): State<AppState>, form: FormData) -> AuthResult<impl IntoResponse> {
    let response = account::login(state.store.as_ref(), &state.sessions, &form).await?;
    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<AppState>,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let success = account::reset_password(state.store.as_ref(), &form).await?;
    Ok(Json(success))
}

pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let user = profile::update_profile(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(user))
}

pub async fn update_username(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let success = profile::update_username(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(success))
}

pub async fn update_email(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let success = profile::update_email(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(success))
}

pub async fn update_password(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> AuthResult<impl IntoResponse> {
    let success = profile::update_password(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(success))
}
