//! `PaymentProcessor` implementation over the Stripe REST API.

use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;

use payments_types::{
    PaymentEvent, PaymentEventKind, PaymentIntentRequest, PaymentProcessor, ProcessorResponse,
    ProviderError, ProviderId, TxStatus,
};

use crate::signature::{self, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, SignatureError};
use crate::wire;

const INTENT_CREATE_FAILED: &str = "Payment creation failed";
const INTENT_FETCH_FAILED: &str = "Collecting payment details failed";
const INTENT_CANCEL_FAILED: &str = "Payment cancellation failed";
const CHARGE_FAILED: &str = "Direct charge failed";

/// Stripe account settings.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// API origin, overridable for test doubles
    pub api_base: String,
    pub webhook_tolerance_secs: i64,
    pub request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: "https://api.stripe.com".to_string(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Stripe adapter.
pub struct StripeProcessor {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Malformed(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base, path)
    }

    /// Sends an authenticated request and decodes the success body. Any
    /// transport, status or decoding failure becomes a rejection tagged with
    /// `code`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        code: &'static str,
        reason: &'static str,
    ) -> Result<T, ProviderError> {
        let response = request
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(code, error = %e, "stripe request failed");
                ProviderError::rejected(code, format!("{}: provider unreachable", reason))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<wire::ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message.or(b.error.code))
                .unwrap_or_else(|| status.to_string());
            tracing::warn!(code, %status, detail = %detail, "stripe rejected request");
            return Err(ProviderError::rejected(
                code,
                format!("{}: {}", reason, detail),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            tracing::warn!(code, error = %e, "undecodable stripe response");
            ProviderError::rejected(code, format!("{}: unexpected response", reason))
        })
    }
}

/// Stripe ids are interpolated into URL paths, so only id-shaped values pass.
fn path_id<'a>(id: &'a str, code: &'static str, reason: &str) -> Result<&'a str, ProviderError> {
    let id = id.trim();
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(id)
    } else {
        Err(ProviderError::rejected(
            code,
            format!("{}: invalid identifier", reason),
        ))
    }
}

fn metadata_params(req: &PaymentIntentRequest, params: &mut Vec<(String, String)>) {
    for (key, value) in &req.metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    fn id(&self) -> ProviderId {
        ProviderId::new(crate::PROVIDER)
    }

    #[tracing::instrument(skip(self, req), fields(customer_id = %req.customer_id))]
    async fn create_intent(
        &self,
        req: &PaymentIntentRequest,
    ) -> Result<ProcessorResponse, ProviderError> {
        let mut params = vec![
            ("amount".to_string(), req.amount.to_string()),
            ("currency".to_string(), req.currency.to_string()),
        ];
        if let Some(kind) = req.payment_method.as_deref().filter(|k| !k.is_empty()) {
            params.push(("payment_method_types[]".to_string(), kind.to_string()));
        }
        metadata_params(req, &mut params);

        let intent: wire::PaymentIntent = self
            .send(
                self.http.post(self.url("payment_intents")).form(&params),
                "intent_create",
                INTENT_CREATE_FAILED,
            )
            .await?;
        tracing::debug!(intent_id = %intent.id, status = %intent.status, "stripe intent created");
        intent.into_response()
    }

    #[tracing::instrument(skip(self, req), fields(customer_id = %req.customer_id))]
    async fn charge(&self, req: &PaymentIntentRequest) -> Result<ProcessorResponse, ProviderError> {
        let token = path_id(
            req.token.as_deref().unwrap_or_default(),
            "method_lookup",
            CHARGE_FAILED,
        )?;

        let method: wire::PaymentMethod = self
            .send(
                self.http.get(self.url(&format!("payment_methods/{}", token))),
                "method_lookup",
                CHARGE_FAILED,
            )
            .await?;
        if method.id != token {
            return Err(ProviderError::rejected(
                "method_lookup",
                format!(
                    "{}: looked up {} but stripe returned {}",
                    CHARGE_FAILED, token, method.id
                ),
            ));
        }

        let customer = match method.customer.clone() {
            Some(existing) => existing.into_id(),
            None => {
                let customer: wire::Customer = self
                    .send(
                        self.http
                            .post(self.url("customers"))
                            .form(&[("metadata[customer_id]", req.customer_id.as_str())]),
                        "customer_create",
                        CHARGE_FAILED,
                    )
                    .await?;

                let _: wire::PaymentMethod = self
                    .send(
                        self.http
                            .post(self.url(&format!("payment_methods/{}/attach", token)))
                            .form(&[("customer", customer.id.as_str())]),
                        "method_attach",
                        CHARGE_FAILED,
                    )
                    .await?;
                tracing::debug!(customer = %customer.id, "attached payment method to new stripe customer");
                customer.id
            }
        };

        let mut params = vec![
            ("amount".to_string(), req.amount.to_string()),
            ("currency".to_string(), req.currency.to_string()),
            ("customer".to_string(), customer),
            ("payment_method".to_string(), token.to_string()),
            ("confirm".to_string(), "true".to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                "automatic_payment_methods[allow_redirects]".to_string(),
                "never".to_string(),
            ),
        ];
        metadata_params(req, &mut params);

        let intent: wire::PaymentIntent = self
            .send(
                self.http.post(self.url("payment_intents")).form(&params),
                "charge_confirm",
                CHARGE_FAILED,
            )
            .await?;

        let mut res = intent.into_response()?;
        if res.status != TxStatus::Succeeded {
            return Err(ProviderError::rejected(
                "charge_confirm",
                format!(
                    "{}: intent {} is {}",
                    CHARGE_FAILED, res.id, res.provider_status
                ),
            ));
        }
        res.payment_method_id.get_or_insert_with(|| token.to_string());
        res.payment_method_type = method.method_type;
        Ok(res)
    }

    #[tracing::instrument(skip(self))]
    async fn get_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError> {
        let id = path_id(id, "intent_fetch", INTENT_FETCH_FAILED)?;
        let intent: wire::PaymentIntent = self
            .send(
                self.http.get(self.url(&format!("payment_intents/{}", id))),
                "intent_fetch",
                INTENT_FETCH_FAILED,
            )
            .await?;
        intent.into_response()
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_intent(&self, id: &str) -> Result<ProcessorResponse, ProviderError> {
        let id = path_id(id, "intent_cancel", INTENT_CANCEL_FAILED)?;
        let intent: wire::PaymentIntent = self
            .send(
                self.http
                    .post(self.url(&format!("payment_intents/{}/cancel", id)))
                    .form(&[("cancellation_reason", "abandoned")]),
                "intent_cancel",
                INTENT_CANCEL_FAILED,
            )
            .await?;
        intent.into_response()
    }

    fn parse_webhook(&self, raw: &[u8], headers: &HeaderMap) -> Result<PaymentEvent, ProviderError> {
        if self.config.webhook_secret.is_empty() {
            return Err(ProviderError::InvalidSignature(
                "webhook secret is not configured".into(),
            ));
        }

        let header = headers
            .get(SIGNATURE_HEADER)
            .ok_or(SignatureError::MissingHeader)
            .and_then(|v| v.to_str().map_err(|_| SignatureError::MalformedHeader))
            .map_err(|e| ProviderError::InvalidSignature(e.to_string()))?;

        signature::verify(
            &self.config.webhook_secret,
            header,
            raw,
            self.config.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )
        .map_err(|e| ProviderError::InvalidSignature(e.to_string()))?;

        let event: wire::Event =
            serde_json::from_slice(raw).map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let kind = match event.event_type.as_str() {
            "payment_intent.succeeded" => PaymentEventKind::Succeeded,
            "payment_intent.payment_failed" => PaymentEventKind::Failed,
            "payment_intent.canceled" => PaymentEventKind::Canceled,
            _ => return Ok(PaymentEvent::opaque(event.event_type, raw.to_vec())),
        };

        let intent: wire::PaymentIntent = serde_json::from_value(event.data.object)
            .map_err(|e| ProviderError::Malformed(format!("event data: {}", e)))?;
        let payment_method = intent.payment_method_id();
        let response = intent.into_response()?;

        Ok(PaymentEvent::intent(kind, response.into(), payment_method))
    }
}
