//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use payments_types::{
    CurrencyCode, PaymentEvent, PaymentInfoRequest, PaymentIntentRequest, PaymentIntentResponse,
    PaymentMethodResponse, PaymentMethodStatus, ProviderId, Transaction, TransactionId, TxStatus,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

/// Error body returned for every rejected request.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "Not configured: payment provider 'paypal'")]
    pub error: String,
    #[schema(example = 400)]
    pub code: u16,
}

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/payments/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = inline(serde_json::Value), example = json!({"status": "OK"}))
    )
)]
async fn health() {}

/// Create a payment intent and record it as pending
#[utoipa::path(
    post,
    path = "/payments/{provider}/intent",
    tag = "payments",
    params(("provider" = ProviderId, Path, description = "Registered provider id")),
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = PaymentIntentResponse),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
async fn create_intent() {}

/// Fetch the provider-side state of an intent
#[utoipa::path(
    get,
    path = "/payments/{provider}/intent",
    tag = "payments",
    params(
        ("provider" = ProviderId, Path, description = "Registered provider id"),
        ("id" = Option<String>, Query, description = "Intent id; may be sent as a JSON body instead")
    ),
    responses(
        (status = 200, description = "Intent state", body = PaymentIntentResponse),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
async fn get_intent() {}

/// Apply the provider-side state of an intent to its local transaction
#[utoipa::path(
    post,
    path = "/payments/{provider}/intent/sync",
    tag = "payments",
    params(("provider" = ProviderId, Path, description = "Registered provider id")),
    request_body = PaymentInfoRequest,
    responses(
        (status = 200, description = "Intent state after sync", body = PaymentIntentResponse),
        (status = 400, description = "Rejected or no local transaction", body = ErrorBody)
    )
)]
async fn sync_intent() {}

/// Charge a payment method directly
#[utoipa::path(
    post,
    path = "/payments/{provider}/charge",
    tag = "payments",
    params(("provider" = ProviderId, Path, description = "Registered provider id")),
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Charge succeeded", body = PaymentIntentResponse),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
async fn charge() {}

/// Stored payment methods of a customer
#[utoipa::path(
    get,
    path = "/payments/methods/{id}",
    tag = "payments",
    params(("id" = String, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Payment methods, possibly none", body = Vec<PaymentMethodResponse>),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
async fn payment_methods() {}

/// Receive a signed provider notification
#[utoipa::path(
    post,
    path = "/webhooks/{provider}",
    tag = "webhooks",
    params(("provider" = ProviderId, Path, description = "Registered provider id")),
    request_body(content = String, description = "Raw provider payload, verified against the signature header"),
    responses(
        (status = 200, description = "Verified and applied", body = PaymentEvent),
        (status = 400, description = "Invalid signature, malformed payload or unknown intent", body = ErrorBody)
    )
)]
async fn webhook() {}

/// Transactions still pending
#[utoipa::path(
    get,
    path = "/transactions/pending",
    tag = "transactions",
    params(("since" = Option<String>, Query, description = "RFC 3339 lower bound on creation time; default 24h ago")),
    responses(
        (status = 200, description = "Pending transactions, newest first", body = Vec<Transaction>),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
async fn pending_transactions() {}

/// OpenAPI documentation for the Payments API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment Orchestration API",
        version = "1.0.0",
        description = "Provider-agnostic payment intents, direct charges and webhook reconciliation.\n\nEvery failure is returned as `400` with a JSON body `{\"error\": ..., \"code\": 400}`.",
        license(name = "MIT"),
    ),
    paths(
        health,
        create_intent,
        get_intent,
        sync_intent,
        charge,
        payment_methods,
        webhook,
        pending_transactions,
    ),
    components(
        schemas(
            PaymentIntentRequest,
            PaymentIntentResponse,
            PaymentInfoRequest,
            PaymentMethodResponse,
            PaymentMethodStatus,
            PaymentEvent,
            Transaction,
            TransactionId,
            TxStatus,
            CurrencyCode,
            ProviderId,
            ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "Intents, charges and stored payment methods"),
        (name = "webhooks", description = "Provider notifications"),
        (name = "transactions", description = "Local transaction queries"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/payments/health",
            "/payments/{provider}/intent",
            "/payments/{provider}/intent/sync",
            "/payments/{provider}/charge",
            "/payments/methods/{id}",
            "/webhooks/{provider}",
            "/transactions/pending",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
