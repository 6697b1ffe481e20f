//! Admin surface tests, driven through the router without a listener.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use virdi_server::admin;
use virdi_engine::{Engine, Resource};

fn setup() -> (Arc<Engine>, Router) {
    let engine = Arc::new(Engine::new([Resource::new("iron", 100)]));
    let router = admin::router(Arc::clone(&engine));
    (engine, router)
}

async fn post(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn health_answers_ok() {
    let (_engine, router) = setup();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn produce_reports_keep_coming_until_saturation() {
    let (engine, router) = setup();

    let (status, body) = post(
        router.clone(),
        "/resources/produce",
        json!({ "resource_id": "iron", "amount": 30 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keep_coming"], json!(true));

    let (status, body) = post(
        router,
        "/resources/produce",
        json!({ "resource_id": "iron", "amount": 80 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keep_coming"], json!(false));

    let resource = engine.resource("iron").unwrap();
    assert_eq!(resource.buffer().amount().await, 100);
}

#[tokio::test]
async fn produce_rejects_unknown_resources() {
    let (_engine, router) = setup();
    let (status, _body) = post(
        router,
        "/resources/produce",
        json!({ "resource_id": "gold", "amount": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_consume_drains_a_plain_consumer() {
    let (engine, router) = setup();
    engine
        .create_consumer("c1", "iron", 50, None, None)
        .await
        .unwrap();
    engine.produce("iron", 80).await.unwrap();

    let (status, body) = post(
        router,
        "/resources/consume",
        json!({ "consumer_id": "c1", "amount": 60 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], json!(60));
}

#[tokio::test]
async fn manual_consume_rejects_unknown_consumers() {
    let (_engine, router) = setup();
    let (status, _body) = post(
        router,
        "/resources/consume",
        json!({ "consumer_id": "ghost", "amount": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_consume_refuses_notifier_backed_consumers() {
    let (engine, router) = setup();

    let (status, _body) = post(
        router.clone(),
        "/consumers/create",
        json!({
            "consumer_id": "c1",
            "resource_id": "iron",
            "notifier_type": "debug",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    engine.produce("iron", 10).await.unwrap();

    let (status, body) = post(
        router,
        "/resources/consume",
        json!({ "consumer_id": "c1", "amount": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("cannot be consumed manually"));
}

#[tokio::test]
async fn create_consumer_answers_with_the_id() {
    let (engine, router) = setup();
    let (status, body) = post(
        router,
        "/consumers/create",
        json!({
            "consumer_id": "c1",
            "resource_id": "iron",
            "buffer_limit": 25,
            "max_rate": 60,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!("c1"));

    let consumer = engine.consumer("c1").unwrap();
    assert_eq!(consumer.buffer().limit(), 25);
    assert_eq!(consumer.max_rate(), Some(60));
}

#[tokio::test]
async fn duplicate_create_conflicts_and_leaves_the_original() {
    let (engine, router) = setup();
    engine
        .create_consumer("c1", "iron", 50, None, None)
        .await
        .unwrap();

    let (status, _body) = post(
        router,
        "/consumers/create",
        json!({ "consumer_id": "c1", "resource_id": "iron", "buffer_limit": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The existing consumer is unchanged.
    let consumer = engine.consumer("c1").unwrap();
    assert_eq!(consumer.buffer().limit(), 50);
}

#[tokio::test]
async fn create_rejects_unknown_resources_and_notifier_types() {
    let (_engine, router) = setup();

    let (status, _body) = post(
        router.clone(),
        "/consumers/create",
        json!({ "consumer_id": "c1", "resource_id": "gold" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(
        router,
        "/consumers/create",
        json!({
            "consumer_id": "c2",
            "resource_id": "iron",
            "notifier_type": "carrier-pigeon",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], json!("Notifier type does not exist"));
}
