//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::{
    error::{ActionError, StoreError},
    form::FormData,
    identity::Identity,
    session::require_session,
    store::RecordId,
};
use serde_json::json;

use crate::{
    actions::{comment, project, vote},
    error::ApiResult,
    state::AppState,
};

/// Largest request body accepted, enough for a batch of gallery images
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:project_id/vote", post(vote_on_project))
        .route("/projects/:project_id/comments", post(create_comment))
        .route("/projects/:project_id/comments/update", post(update_comment))
        .route("/projects/:project_id/comments/delete", post(delete_comment))
        .route("/projects/:project_id/comments/reply", post(create_reply))
        .route("/projects/:project_id/tags", post(update_tags))
        .route("/projects/:project_id/images", post(update_images))
        .route("/projects/:project_id/thumbnail", post(update_thumbnail))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/projects/:project_id", get(get_project))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Route ids that cannot name a record are reported like a missing record
fn record_id(raw: &str) -> ApiResult<RecordId> {
    RecordId::parse(raw).ok_or_else(|| ActionError::from(StoreError::not_found()))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Project with its votes and comments
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let detail = project::project_detail(state.store.as_ref(), &project_id).await?;
    Ok(Json(detail))
}

/// Create a project
pub async fn create_project(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let record = project::create_project(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(record))
}

/// Toggle the caller's vote; answers with an empty 200
pub async fn vote_on_project(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
) -> ApiResult<StatusCode> {
    let project_id = record_id(&project_id)?;
    vote::toggle_vote(
        state.store.as_ref(),
        state.vote_lock.as_ref(),
        &identity,
        &project_id,
    )
    .await?;
    Ok(StatusCode::OK)
}

pub async fn create_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success = comment::create_comment(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

pub async fn update_comment(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success = comment::update_comment(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    identity: Identity,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let success = comment::delete_comment(state.store.as_ref(), &identity, &form).await?;
    Ok(Json(success))
}

pub async fn create_reply(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success = comment::create_reply(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

pub async fn update_tags(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success = project::update_tags(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

pub async fn update_images(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success = project::update_images(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

pub async fn update_thumbnail(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<String>,
    form: FormData,
) -> ApiResult<impl IntoResponse> {
    let project_id = record_id(&project_id)?;
    let success =
        project::update_thumbnail(state.store.as_ref(), &identity, &project_id, &form).await?;
    Ok(Json(success))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use common::{
        lock::{LocalLock, LockConfig},
        session::{SessionConfig, SessionKeys},
        store::{Collection, memory::InMemoryStore},
    };
    use http_body_util::BodyExt;
    use serde_json::{Map, Value};
    use tower::ServiceExt;

    struct Harness {
        store: InMemoryStore,
        router: Router,
        token: String,
        project: RecordId,
    }

    async fn harness() -> Harness {
        let store = InMemoryStore::new();
        let user = store.insert(Collection::Users, Map::new()).await;
        let project = store.insert(Collection::Projects, Map::new()).await;

        let sessions = SessionKeys::new(&SessionConfig {
            secret: "router-secret".to_string(),
            ttl_seconds: 60,
        });
        let token = sessions
            .issue(&Identity::new(user.id, "memory-token"))
            .unwrap();

        let router = create_router(AppState {
            store: Arc::new(store.clone()),
            vote_lock: Arc::new(LocalLock::new(&LockConfig::default())),
            sessions,
        });

        Harness {
            store,
            router,
            token,
            project: project.id,
        }
    }

    fn form_post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_answers() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let h = harness().await;
        let uri = format!("/projects/{}/vote", h.project);
        let response = h.router.oneshot(form_post(&uri, None, "")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(h.store.records(Collection::Votes).await.is_empty());
    }

    #[tokio::test]
    async fn vote_answers_with_an_empty_ok() {
        let h = harness().await;
        let uri = format!("/projects/{}/vote", h.project);
        let response = h
            .router
            .oneshot(form_post(&uri, Some(&h.token), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
        assert_eq!(h.store.records(Collection::Votes).await.len(), 1);
    }

    #[tokio::test]
    async fn comment_is_created_for_the_route_project() {
        let h = harness().await;
        let uri = format!("/projects/{}/comments", h.project);
        let response = h
            .router
            .oneshot(form_post(&uri, Some(&h.token), "content=Love+it&project=other"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "success": true }));
        let stored = &h.store.records(Collection::Comments).await[0];
        assert_eq!(stored.relation("project"), Some(h.project.clone()));
    }

    #[tokio::test]
    async fn invalid_comment_echoes_data_and_errors() {
        let h = harness().await;
        let uri = format!("/projects/{}/comments", h.project);
        let response = h
            .router
            .oneshot(form_post(&uri, Some(&h.token), "content=a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["data"], json!({ "content": "a" }));
        assert_eq!(
            body["errors"]["content"],
            json!(["Comment must be at least 2 characters"])
        );
    }

    #[tokio::test]
    async fn project_detail_is_public() {
        let h = harness().await;
        let uri = format!("/projects/{}", h.project);
        let response = h
            .router
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["project"]["expand"]["votes(project)"], json!([]));
        assert_eq!(body["comments"], json!([]));
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let h = harness().await;
        let response = h
            .router
            .oneshot(Request::get("/projects/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
