//! End-to-end tests of the HTTP surface over in-memory SQLite.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

use common::{WEBHOOK_SECRET, app, get, post_json, send};
use payments_stripe::signature;

fn intent_body(remember: bool) -> serde_json::Value {
    json!({
        "amount": 1000,
        "currency": "usd",
        "customer_id": "cust_1",
        "remember_me": remember,
        "metadata": { "order": "42" }
    })
}

fn stripe_event(kind: &str, intent: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_http",
        "type": kind,
        "data": { "object": {
            "id": intent,
            "amount": 1000,
            "currency": "usd",
            "status": "succeeded",
            "payment_method": "pm_card_visa"
        }}
    }))
    .unwrap()
}

fn stripe_webhook(payload: Vec<u8>, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("Content-Type", "application/json");
    if let Some(secret) = secret {
        let header = signature::sign(secret, chrono::Utc::now().timestamp(), &payload).unwrap();
        builder = builder.header(signature::SIGNATURE_HEADER, header);
    }
    builder.body(Body::from(payload)).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Basics
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = app(100).await;
    let (status, body) = send(&app, get("/payments/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app(100).await;
    let (status, body) = send(&app, get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/webhooks/{provider}"].is_object());
}

#[tokio::test]
async fn test_errors_are_400_with_message() {
    let app = app(100).await;

    let (status, body) = send(&app, post_json("/payments/paypal/intent", intent_body(false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("Not configured"));

    let malformed = Request::builder()
        .method("POST")
        .uri("/payments/mock/intent")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));

    let (status, _) = send(&app, post_json("/payments/mock/intent", json!({
        "amount": -5, "currency": "usd", "customer_id": "cust_1"
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─────────────────────────────────────────────────────────────────────────────
// Intents and charges
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_intent_is_listed_as_pending() {
    let app = app(100).await;

    let (status, intent) = send(&app, post_json("/payments/mock/intent", intent_body(true))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["status"], "pending");
    assert_eq!(intent["client_secret"], "secret_http");

    let (status, pending) = send(&app, get("/transactions/pending")).await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["payment_intent_id"], intent["id"]);
    assert_eq!(pending[0]["metadata"]["order"], "42");
}

#[tokio::test]
async fn test_pending_rejects_bad_since() {
    let app = app(100).await;
    let (status, _) = send(&app, get("/transactions/pending?since=yesterday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/transactions/pending?since=2030-01-01T00:00:00Z")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_get_intent_by_query_or_body() {
    let app = app(100).await;

    let (status, by_query) = send(&app, get("/payments/mock/intent?id=pi_lookup")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_query["id"], "pi_lookup");

    let by_body = Request::builder()
        .uri("/payments/mock/intent")
        .body(Body::from(r#"{"id":"pi_body"}"#))
        .unwrap();
    let (status, body) = send(&app, by_body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "pi_body");

    let (status, _) = send(&app, get("/payments/mock/intent")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_charge_remembers_payment_method_once() {
    let app = app(100).await;
    let mut req = intent_body(true);
    req["token"] = json!("pm_card_visa");

    for _ in 0..2 {
        let (status, charge) = send(&app, post_json("/payments/mock/charge", req.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(charge["status"], "succeeded");
    }

    let (status, methods) = send(&app, get("/payments/methods/cust_1")).await;
    assert_eq!(status, StatusCode::OK);
    let methods = methods.as_array().unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0]["client_id"], "cust_1");
    assert_eq!(methods[0]["payment_method_id"], "pm_card_visa");
    assert_eq!(methods[0]["payment_provider"], "mock");
    assert_eq!(methods[0]["payment_method_status"], "active");

    let (status, none) = send(&app, get("/payments/methods/cust_unknown")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(none, json!([]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhooks
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_signed_webhook_settles_transaction() {
    let app = app(100).await;
    let (_, intent) = send(&app, post_json("/payments/mock/intent", intent_body(true))).await;
    let intent_id = intent["id"].as_str().unwrap();

    let (status, event) = send(
        &app,
        stripe_webhook(stripe_event("payment_intent.succeeded", intent_id), Some(WEBHOOK_SECRET)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["type"], "payment_succeeded");
    assert_eq!(event["payment_intent"], intent_id);

    let (_, pending) = send(&app, get("/transactions/pending")).await;
    assert_eq!(pending, json!([]));

    let (_, methods) = send(&app, get("/payments/methods/cust_1")).await;
    assert_eq!(methods[0]["payment_method_id"], "pm_card_visa");
    assert_eq!(methods[0]["payment_provider"], "stripe");
}

#[tokio::test]
async fn test_unsigned_or_forged_webhook_is_rejected() {
    let app = app(100).await;
    let (_, intent) = send(&app, post_json("/payments/mock/intent", intent_body(false))).await;
    let intent_id = intent["id"].as_str().unwrap();

    for secret in [None, Some("whsec_forged")] {
        let (status, body) = send(
            &app,
            stripe_webhook(stripe_event("payment_intent.succeeded", intent_id), secret),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid signature"));
    }

    let (_, pending) = send(&app, get("/transactions/pending")).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_for_unknown_intent_is_reconciliation_error() {
    let app = app(100).await;

    let (status, body) = send(
        &app,
        stripe_webhook(
            stripe_event("payment_intent.payment_failed", "pi_nowhere"),
            Some(WEBHOOK_SECRET),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Reconciliation error"));
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let app = app(100).await;

    let (status, event) = send(
        &app,
        stripe_webhook(stripe_event("charge.refunded", "pi_any"), Some(WEBHOOK_SECRET)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["type"], "charge.refunded");
}
