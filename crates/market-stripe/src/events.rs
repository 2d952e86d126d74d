//! # Stripe Event Parsing
//!
//! Turns a verified Stripe event envelope into a `PaymentEvent`.
//! Payment intent events must carry a well-formed PaymentIntent object;
//! anything else is rejected instead of being passed through as loose JSON.

use chrono::{DateTime, Utc};
use market_core::{Currency, MarketError, MarketResult, PaymentEvent, PaymentEventType};
use serde::Deserialize;
use std::collections::HashMap;

/// Events the webhook endpoint should be subscribed to in the Stripe Dashboard
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
];

#[derive(Debug, Deserialize)]
struct StripeEventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntentObject {
    id: String,
    amount: i64,
    #[serde(default)]
    amount_received: Option<i64>,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Parse a verified webhook payload
pub fn parse_event(payload: &[u8]) -> MarketResult<PaymentEvent> {
    let envelope: StripeEventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| MarketError::EventParse(format!("Failed to parse webhook: {}", e)))?;

    let created_at = DateTime::from_timestamp(envelope.created, 0).unwrap_or_else(Utc::now);
    let event_type = PaymentEventType::from_type_str(&envelope.event_type);

    let (payment_intent_id, amount, currency_code, metadata) =
        if envelope.event_type.starts_with("payment_intent.") {
            let intent: StripePaymentIntentObject =
                serde_json::from_value(envelope.data.object).map_err(|e| {
                    MarketError::EventParse(format!(
                        "{} does not contain a payment intent: {}",
                        envelope.event_type, e
                    ))
                })?;

            let amount = match event_type {
                PaymentEventType::PaymentSucceeded => {
                    intent.amount_received.unwrap_or(intent.amount)
                }
                _ => intent.amount,
            };

            (
                Some(intent.id),
                Some(amount),
                Some(intent.currency),
                intent.metadata,
            )
        } else {
            let object = &envelope.data.object;
            let payment_intent_id = object
                .get("payment_intent")
                .and_then(|v| v.as_str())
                .map(String::from);
            let metadata = object
                .get("metadata")
                .and_then(|m| m.as_object())
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect::<HashMap<String, String>>()
                })
                .unwrap_or_default();
            (payment_intent_id, None, None, metadata)
        };

    let currency = currency_code
        .as_deref()
        .and_then(|code| code.parse::<Currency>().ok());

    Ok(PaymentEvent {
        event_id: envelope.id,
        event_type,
        provider: "stripe".to_string(),
        payment_intent_id,
        amount,
        currency,
        currency_code,
        metadata,
        created_at,
    })
}
