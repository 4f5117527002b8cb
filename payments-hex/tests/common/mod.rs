//! Shared fixtures for the HTTP integration tests.
//!
//! The router is backed by in-memory SQLite, a fixed-answer `mock`
//! provider for intents and charges, and the real Stripe adapter for
//! signed webhooks.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use payments_hex::{
    PaymentService, ProviderRegistry, RepositoryRegistry,
    inbound::{HttpServer, RateLimiterState},
};
use payments_repo::{PoolSettings, SqliteRepo};
use payments_stripe::{StripeConfig, StripeProcessor};
use payments_types::{
    PaymentEvent, PaymentIntentRequest, PaymentMethod, PaymentProcessor, ProcessorResponse,
    ProviderError, ProviderId, Repository, Transaction, TxStatus,
};

pub const WEBHOOK_SECRET: &str = "whsec_http_test";

#[derive(Default)]
pub struct FixedProcessor {
    counter: AtomicUsize,
}

fn fixed(id: String, amount: i64, status: TxStatus) -> ProcessorResponse {
    ProcessorResponse {
        id,
        amount,
        currency: "usd".parse().unwrap(),
        status,
        provider_status: status.to_string(),
        client_secret: Some("secret_http".into()),
        payment_method_id: None,
        payment_method_type: None,
    }
}

#[async_trait]
impl PaymentProcessor for FixedProcessor {
    fn id(&self) -> ProviderId {
        ProviderId::new("mock")
    }

    async fn create_intent(
        &self,
        req: &PaymentIntentRequest,
    ) -> Result<ProcessorResponse, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(fixed(format!("pi_http_{}", n), req.amount, TxStatus::Pending))
    }

    async fn charge(&self, req: &PaymentIntentRequest) -> Result<ProcessorResponse, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut res = fixed(format!("pi_http_charge_{}", n), req.amount, TxStatus::Succeeded);
        res.payment_method_id = req.token.clone();
        res.payment_method_type = Some("card".into());
        Ok(res)
    }

    async fn get_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError> {
        Ok(fixed(id.to_string(), 1000, TxStatus::Pending))
    }

    async fn cancel_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError> {
        Ok(fixed(id.to_string(), 1000, TxStatus::Canceled))
    }

    fn parse_webhook(&self, _raw: &[u8], _headers: &HeaderMap) -> Result<PaymentEvent, ProviderError> {
        Err(ProviderError::InvalidSignature("mock provider has no webhooks".into()))
    }
}

/// Router trusting `X-Forwarded-For`, as when deployed behind a proxy.
pub async fn app(requests_per_minute: u32) -> Router {
    app_with_limiter(
        RateLimiterState::new(requests_per_minute, Duration::from_secs(60))
            .trust_forwarded_for(true),
    )
    .await
}

pub async fn app_with_limiter(limiter: RateLimiterState) -> Router {
    let repo = Arc::new(
        SqliteRepo::new("sqlite::memory:", &PoolSettings::default())
            .await
            .unwrap(),
    );

    let stripe = StripeProcessor::new(StripeConfig::new("sk_test_http", WEBHOOK_SECRET)).unwrap();
    let mut providers = ProviderRegistry::new();
    providers
        .register(Arc::new(FixedProcessor::default()))
        .register(Arc::new(stripe));

    let transactions: Arc<dyn Repository<Transaction>> = repo.clone();
    let methods: Arc<dyn Repository<PaymentMethod>> = repo;
    let mut repositories = RepositoryRegistry::new();
    repositories.register(transactions).register(methods);

    HttpServer::with_rate_limiter(PaymentService::new(providers, repositories), limiter).router()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
