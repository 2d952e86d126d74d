//! # Stripe Payment Intents
//!
//! `PaymentProcessor` implementation backed by the Stripe PaymentIntents API.
//! The browser confirms the intent with Stripe.js using the returned client
//! secret, so card data never passes through this service.

use crate::config::StripeConfig;
use crate::events::parse_event;
use crate::signature::verify_signature;
use async_trait::async_trait;
use chrono::Utc;
use market_core::{
    Currency, MarketError, MarketResult, PaymentEvent, PaymentIntent, PaymentIntentRequest,
    PaymentProcessor,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Stripe PaymentIntents processor
pub struct StripeProcessor {
    config: StripeConfig,
    client: Client,
}

impl StripeProcessor {
    /// Create a new Stripe processor
    pub fn new(config: StripeConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        if config.is_live_mode() {
            info!("Stripe processor using live keys");
        } else if config.is_test_mode() {
            info!("Stripe processor using test keys");
        } else {
            warn!("Stripe secret key has an unrecognised prefix");
        }

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> MarketResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    /// Publishable key for the browser SDK
    pub fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }

    /// Build form data for `POST /v1/payment_intents`
    fn intent_form(request: &PaymentIntentRequest) -> Vec<(String, String)> {
        let mut form_params = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.as_str().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        let mut metadata: Vec<_> = request.metadata.to_map().into_iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            form_params.push((format!("metadata[{}]", key), value));
        }

        form_params
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    #[instrument(skip(self, request), fields(listing_id = %request.metadata.listing_id, amount = request.amount))]
    async fn create_intent(&self, request: &PaymentIntentRequest) -> MarketResult<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.config.api_base_url);
        let form_params = Self::intent_form(request);

        debug!("Creating Stripe payment intent: {} params", form_params.len());

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form_params);

        if let Some(ref key) = request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MarketError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            let message = match serde_json::from_str::<StripeErrorResponse>(&body) {
                Ok(error_response) => error_response.error.message,
                Err(_) => format!("HTTP {}: {}", status, body),
            };

            return Err(MarketError::ProcessorError {
                provider: "stripe".to_string(),
                message,
            });
        }

        let intent: StripePaymentIntentResponse = serde_json::from_str(&body).map_err(|e| {
            MarketError::ProcessorError {
                provider: "stripe".to_string(),
                message: format!("Failed to parse Stripe response: {}", e),
            }
        })?;

        let client_secret = intent.client_secret.ok_or_else(|| MarketError::ProcessorError {
            provider: "stripe".to_string(),
            message: format!("payment intent {} has no client_secret", intent.id),
        })?;

        let currency = intent
            .currency
            .parse::<Currency>()
            .unwrap_or(request.currency);

        info!("Created Stripe payment intent: id={}", intent.id);

        Ok(PaymentIntent {
            id: intent.id,
            client_secret,
            amount: intent.amount,
            currency,
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_and_parse_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> MarketResult<PaymentEvent> {
        verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event = parse_event(payload)?;
        debug!("Verified Stripe webhook: id={}", event.event_id);
        Ok(event)
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResponse {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign_payload;
    use market_core::{PaymentEventType, PaymentMetadata};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WEBHOOK_SECRET: &str = "whsec_test_secret";

    fn request() -> PaymentIntentRequest {
        PaymentIntentRequest::new(
            4999,
            Currency::USD,
            PaymentMetadata {
                listing_id: "L1".to_string(),
                buyer_id: "buyer1".to_string(),
                seller_id: "seller1".to_string(),
            },
        )
    }

    fn processor(base_url: &str) -> StripeProcessor {
        let config = StripeConfig::new("sk_test_abc", "pk_test_abc", WEBHOOK_SECRET)
            .with_api_base_url(base_url);
        StripeProcessor::new(config).unwrap()
    }

    #[test]
    fn test_intent_form_params() {
        let form = StripeProcessor::intent_form(&request());

        assert!(form.contains(&("amount".to_string(), "4999".to_string())));
        assert!(form.contains(&("currency".to_string(), "usd".to_string())));
        assert!(form.contains(&("metadata[listingId]".to_string(), "L1".to_string())));
        assert!(form.contains(&("metadata[buyerId]".to_string(), "buyer1".to_string())));
        assert!(form.contains(&("metadata[sellerId]".to_string(), "seller1".to_string())));
    }

    #[tokio::test]
    async fn test_create_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(body_string_contains("amount=4999"))
            .and(body_string_contains("metadata%5BlistingId%5D=L1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_123",
                "object": "payment_intent",
                "amount": 4999,
                "currency": "usd",
                "client_secret": "pi_123_secret_abc",
                "status": "requires_payment_method"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = processor(&server.uri()).create_intent(&request()).await.unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret, "pi_123_secret_abc");
        assert_eq!(intent.amount, 4999);
        assert_eq!(intent.currency, Currency::USD);
    }

    #[tokio::test]
    async fn test_create_intent_forwards_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Idempotency-Key", "checkout-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_123",
                "amount": 4999,
                "currency": "usd",
                "client_secret": "pi_123_secret_abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = request().with_idempotency_key("checkout-abc");
        processor(&server.uri()).create_intent(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_intent_stripe_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": { "message": "Your card was declined.", "type": "card_error" }
            })))
            .mount(&server)
            .await;

        let err = processor(&server.uri()).create_intent(&request()).await.unwrap_err();

        match err {
            MarketError::ProcessorError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_intent_network_error() {
        let err = processor("http://127.0.0.1:9")
            .create_intent(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Network(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_verify_and_parse_event() {
        let payload = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": Utc::now().timestamp(),
            "data": { "object": {
                "id": "pi_123",
                "amount": 4999,
                "amount_received": 4999,
                "currency": "usd",
                "metadata": { "listingId": "L1", "buyerId": "buyer1", "sellerId": "seller1" }
            }}
        }))
        .unwrap();
        let signature = sign_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();

        let event = processor("http://unused")
            .verify_and_parse_event(&payload, &signature)
            .await
            .unwrap();

        assert_eq!(event.event_type, PaymentEventType::PaymentSucceeded);
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    async fn test_verify_rejects_tampered_payload() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let signature = sign_payload(payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
        let tampered = br#"{"id":"evt_2","type":"payment_intent.succeeded"}"#;

        let err = processor("http://unused")
            .verify_and_parse_event(tampered, &signature)
            .await
            .unwrap_err();

        assert!(matches!(err, MarketError::SignatureInvalid(_)));
    }
}
