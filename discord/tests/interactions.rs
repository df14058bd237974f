//! End-to-end tests of the interactions endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use whitelist_core::messaging::{InboundEvent, InteractionHandler, InteractionReply, ReplyFuture};
use whitelist_discord::{SignatureVerifier, interactions_router};

/// Handler that records events and answers with a fixed text
#[derive(Default)]
struct EchoHandler {
    seen: Mutex<Vec<InboundEvent>>,
}

impl InteractionHandler for EchoHandler {
    fn handle(&self, event: InboundEvent) -> ReplyFuture<'_> {
        self.seen.lock().unwrap().push(event);
        Box::pin(async { InteractionReply::ephemeral("handled") })
    }
}

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[3u8; 32])
}

fn signed_request(key: &SigningKey, body: &Value) -> Request<Body> {
    let body = body.to_string();
    let timestamp = "1700000000";
    let signature = key.sign(format!("{timestamp}{body}").as_bytes());
    Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("content-type", "application/json")
        .header("X-Signature-Ed25519", hex::encode(signature.to_bytes()))
        .header("X-Signature-Timestamp", timestamp)
        .body(Body::from(body))
        .unwrap()
}

fn app(handler: Arc<EchoHandler>) -> axum::Router {
    interactions_router(handler, SignatureVerifier::new(signing_key().verifying_key()))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let handler = Arc::new(EchoHandler::default());
    let response = app(handler.clone())
        .oneshot(signed_request(&signing_key(), &json!({"type": 1})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"type": 1}));
    assert!(handler.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn button_press_reaches_the_handler() {
    let handler = Arc::new(EchoHandler::default());
    let payload = json!({
        "type": 3,
        "channel_id": "10",
        "message": {"id": "77"},
        "member": {"user": {"id": "42", "username": "steve"}, "roles": []},
        "data": {"custom_id": "request_whitelist", "component_type": 2}
    });

    let response = app(handler.clone())
        .oneshot(signed_request(&signing_key(), &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["type"], 4);
    assert_eq!(body["data"]["content"], "handled");
    assert_eq!(body["data"]["flags"], 64);

    let seen = handler.seen.lock().unwrap();
    assert!(matches!(&seen[0], InboundEvent::Button { custom_id, .. } if custom_id == "request_whitelist"));
}

#[tokio::test]
async fn foreign_signature_is_unauthorized() {
    let handler = Arc::new(EchoHandler::default());
    let intruder = SigningKey::from_bytes(&[9u8; 32]);
    let response = app(handler.clone())
        .oneshot(signed_request(&intruder, &json!({"type": 1})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(handler.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_headers_are_unauthorized() {
    let request = Request::builder()
        .method("POST")
        .uri("/interactions")
        .body(Body::from(r#"{"type":1}"#))
        .unwrap();

    let response = app(Arc::new(EchoHandler::default())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_garbage_is_a_bad_request() {
    let key = signing_key();
    let body = "not json";
    let signature = key.sign(format!("1{body}").as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("X-Signature-Ed25519", hex::encode(signature.to_bytes()))
        .header("X-Signature-Timestamp", "1")
        .body(Body::from(body))
        .unwrap();

    let response = app(Arc::new(EchoHandler::default())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(Arc::new(EchoHandler::default())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
