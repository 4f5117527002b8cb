//! # Payments Client SDK
//!
//! A typed Rust client for the payment orchestration API.

use chrono::{DateTime, Utc};
use payments_types::{
    PaymentEvent, PaymentInfoRequest, PaymentIntentRequest, PaymentIntentResponse,
    PaymentMethodResponse, Transaction,
};
use reqwest::{Client, Url};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(String),
}

/// Payments API client.
pub struct PaymentsClient {
    base_url: String,
    http: Client,
}

impl PaymentsClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(self.url(&["payments", "health"])?)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Creates a payment intent with `provider` and records it as pending.
    pub async fn create_intent(
        &self,
        provider: &str,
        req: &PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, ClientError> {
        self.post(&["payments", provider, "intent"], req).await
    }

    /// Charges the customer directly with the request's token.
    pub async fn charge(
        &self,
        provider: &str,
        req: &PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, ClientError> {
        self.post(&["payments", provider, "charge"], req).await
    }

    /// Fetches the provider's current view of an intent.
    pub async fn get_intent(
        &self,
        provider: &str,
        id: &str,
    ) -> Result<PaymentIntentResponse, ClientError> {
        let resp = self
            .http
            .get(self.url(&["payments", provider, "intent"])?)
            .query(&[("id", id)])
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Pulls the provider's status for an intent into the local record.
    pub async fn sync_intent(
        &self,
        provider: &str,
        id: &str,
    ) -> Result<PaymentIntentResponse, ClientError> {
        let req = PaymentInfoRequest { id: id.to_string() };
        self.post(&["payments", provider, "intent", "sync"], &req)
            .await
    }

    /// Lists the payment methods remembered for a customer.
    pub async fn payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethodResponse>, ClientError> {
        self.get(&["payments", "methods", customer_id]).await
    }

    /// Lists transactions still pending, created at or after `since`.
    pub async fn pending(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, ClientError> {
        let mut req = self.http.get(self.url(&["transactions", "pending"])?);
        if let Some(since) = since {
            req = req.query(&[("since", since.to_rfc3339())]);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    /// Delivers a raw webhook payload, as a provider would.
    pub async fn send_webhook(
        &self,
        provider: &str,
        payload: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<PaymentEvent, ClientError> {
        let resp = self
            .http
            .post(self.url(&["webhooks", provider])?)
            .header(CONTENT_TYPE, "application/json")
            .headers(headers)
            .body(payload)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Url(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let resp = self.http.get(self.url(segments)?).send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.http.post(self.url(segments)?).json(body).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
