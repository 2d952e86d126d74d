//! # Request Handlers
//!
//! Axum request handlers for listing lookup, payment intents and the
//! processor webhook.

use crate::auth::AuthenticatedCaller;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use market_core::{Currency, IssuedIntent, Listing, ListingStatusView, MarketError, Reconciliation};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

/// Signature header sent by Stripe
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
/// Generic signature header accepted as a fallback
pub const SIGNATURE_HEADER: &str = "signature";
/// Optional client-supplied key forwarded to the processor
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create payment intent request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePaymentIntentRequest {
    pub listing_id: String,
}

/// Browser SDK configuration
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigResponse {
    pub publishable_key: String,
    pub currency: Currency,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Error type returned by every fallible handler
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn market_error_to_response(err: MarketError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if err.is_retryable() {
        response = response.with_details("retryable");
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "market-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Get a single listing
#[instrument(skip(state))]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state.store.get_listing(&listing_id).await.map_err(|e| {
        if e.status_code() >= 500 {
            error!("Listing lookup failed: {}", e);
        }
        market_error_to_response(e)
    })?;

    Ok(Json(listing))
}

/// Get a listing's status only
#[instrument(skip(state))]
pub async fn get_listing_status(
    State(state): State<AppState>,
    Path(listing_id): Path<String>,
) -> Result<Json<ListingStatusView>, ApiError> {
    let listing = state
        .store
        .get_listing(&listing_id)
        .await
        .map_err(market_error_to_response)?;

    Ok(Json(listing.status_view()))
}

/// Publishable key and currency for the checkout page
pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        publishable_key: state.publishable_key.clone(),
        currency: state.issuer.currency(),
    })
}

/// Create a payment intent for a listing on behalf of the caller
#[instrument(skip(state, headers, request), fields(buyer_id = %caller.user_id, listing_id = %request.listing_id))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    caller: AuthenticatedCaller,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<IssuedIntent>, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let issued = state
        .issuer
        .create_payment_intent(&request.listing_id, &caller.user_id, idempotency_key)
        .await
        .map_err(|e| {
            error!("Payment intent error: {}", e);
            market_error_to_response(e)
        })?;

    Ok(Json(issued))
}

/// Handle the payment processor webhook.
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what was sent.
#[instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            market_error_to_response(MarketError::SignatureInvalid(
                "Missing signature header".to_string(),
            ))
        })?;

    let outcome = state
        .reconciler
        .handle_webhook(&body, signature)
        .await
        .map_err(|e| {
            if e.status_code() >= 500 {
                error!("Webhook reconciliation failed, processor will retry: {}", e);
            } else {
                warn!("Webhook rejected: {}", e);
            }
            market_error_to_response(e)
        })?;

    match &outcome {
        Reconciliation::Sold(record) => {
            info!(listing_id = %record.listing_id, "Payment succeeded for listing");
        }
        Reconciliation::Duplicate { listing_id } => {
            info!(listing_id = %listing_id, "Duplicate webhook acknowledged");
        }
        other => {
            info!("Webhook acknowledged: {:?}", other);
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_market_error_conversion() {
        let (status, _json) = market_error_to_response(MarketError::not_found("L1"));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _json) =
            market_error_to_response(MarketError::SignatureInvalid("mismatch".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = market_error_to_response(MarketError::Storage("down".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json.details.as_deref(), Some("retryable"));
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let ok: Result<CreatePaymentIntentRequest, _> =
            serde_json::from_str(r#"{"listingId":"L1"}"#);
        assert_eq!(ok.unwrap().listing_id, "L1");

        let bad: Result<CreatePaymentIntentRequest, _> =
            serde_json::from_str(r#"{"listingId":"L1","amount":1}"#);
        assert!(bad.is_err());
    }
}
