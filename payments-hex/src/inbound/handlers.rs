//! HTTP request handlers.
//!
//! Request bodies are read as bytes and decoded here, so a malformed body
//! is a validation error like any other rather than the framework's 422.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use utoipa::OpenApi;

use payments_types::{AppError, PaymentInfoRequest, PaymentIntentRequest};

use crate::PaymentService;
use crate::openapi::ApiDoc;

/// Application state shared across handlers.
pub struct AppState {
    pub service: PaymentService,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Every core failure is reported to the caller as a client error.
        let status = StatusCode::BAD_REQUEST;

        match &self.0 {
            AppError::Storage(_) | AppError::Unavailable(_) | AppError::Timeout(_) => {
                tracing::error!(error = %self.0, "request failed")
            }
            other => tracing::debug!(error = %other, "request rejected"),
        }

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("invalid request body: {}", e)).into())
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ─────────────────────────────────────────────────────────────────────────────
// Intents and charges
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, body))]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: PaymentIntentRequest = decode(&body)?;
    let intent = state.service.create_payment_intent(&provider, req).await?;
    Ok(Json(intent))
}

#[tracing::instrument(skip(state, body))]
pub async fn charge(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: PaymentIntentRequest = decode(&body)?;
    let intent = state.service.charge_client(&provider, req).await?;
    Ok(Json(intent))
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

/// The intent id comes from `?id=` or, failing that, a `{"id": ...}` body.
#[tracing::instrument(skip(state, body))]
pub async fn get_intent(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<IdQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = match query.id {
        Some(id) => id,
        None if body.is_empty() => {
            return Err(AppError::Validation("missing intent id".into()).into());
        }
        None => decode::<PaymentInfoRequest>(&body)?.id,
    };
    let intent = state.service.get_payment_intent(&provider, &id).await?;
    Ok(Json(intent))
}

#[tracing::instrument(skip(state, body))]
pub async fn sync_intent(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: PaymentInfoRequest = decode(&body)?;
    let intent = state.service.sync_payment_intent(&provider, &req.id).await?;
    Ok(Json(intent))
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhooks
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .service
        .parse_webhook(&provider, &body, &headers)
        .await?;
    Ok(Json(event))
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state))]
pub async fn payment_methods(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state.service.get_user_payment_methods(&customer_id).await?;
    Ok(Json(methods))
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    since: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn pending_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = query
        .since
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| AppError::Validation(format!("invalid 'since': {}", e)))
        })
        .transpose()?;

    let transactions = state.service.pending_transactions(since).await?;
    Ok(Json(transactions))
}
