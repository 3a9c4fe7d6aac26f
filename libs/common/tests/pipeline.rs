//! Integration tests for the decode → validate → store pipeline

use axum::{
    Router,
    body::Body,
    extract::FromRequest,
    http::{Request, StatusCode, header},
    middleware,
    routing::get,
};
use common::{
    error::ActionError,
    form::FormData,
    identity::{Caller, Identity},
    session::{SessionConfig, SessionKeys, require_session},
    store::{Collection, Filter, ListOptions, Payload, RecordStore, memory::InMemoryStore},
    validation::{parse, schemas::comment::CREATE_COMMENT},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio_test::assert_ok;
use tower::ServiceExt;

fn urlencoded(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn decoded_comment_reaches_the_store_with_session_ownership() {
    let store = InMemoryStore::new();
    let user = store
        .insert(Collection::Users, Default::default())
        .await;
    let project = store
        .insert(Collection::Projects, Default::default())
        .await;
    let identity = Identity::new(user.id.clone(), "memory-token");

    let form = FormData::from_request(urlencoded("content=++Great+work++&user=mallory"), &())
        .await
        .unwrap();
    let comment = parse(&CREATE_COMMENT, &form).unwrap();

    assert_ok!(
        store
            .create(
                Caller::User(&identity),
                Collection::Comments,
                Payload::new()
                    .text("content", comment.content)
                    .text("project", project.id.as_str())
                    .text("user", identity.user_id().as_str()),
            )
            .await
    );

    let stored = store
        .get_full_list(
            Caller::Anonymous,
            Collection::Comments,
            &ListOptions::new().filter(Filter::eq("project", &project.id)),
        )
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text("content"), Some("Great work"));
    assert_eq!(stored[0].relation("user"), Some(user.id));
}

#[tokio::test]
async fn invalid_submission_echoes_the_form() {
    let form = FormData::from_request(urlencoded("content=x"), &())
        .await
        .unwrap();

    match parse(&CREATE_COMMENT, &form) {
        Err(ActionError::Invalid { data, errors }) => {
            assert_eq!(Value::Object(data), json!({ "content": "x" }));
            assert_eq!(
                errors.get("content").unwrap(),
                ["Comment must be at least 2 characters"]
            );
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn session_middleware_guards_routes() {
    let keys = SessionKeys::new(&SessionConfig {
        secret: "integration-secret".to_string(),
        ttl_seconds: 60,
    });
    let app = Router::new()
        .route(
            "/whoami",
            get(|identity: Identity| async move { identity.user_id().to_string() }),
        )
        .route_layer(middleware::from_fn_with_state(keys.clone(), require_session));

    let anonymous = app
        .clone()
        .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let identity = Identity::new(
        common::store::RecordId::parse("u42").unwrap(),
        "memory-token",
    );
    let token = keys.issue(&identity).unwrap();
    let response = app
        .oneshot(
            Request::get("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"u42");
}
