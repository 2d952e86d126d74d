//! # Payment Types
//!
//! Intent requests, issued intents, processor events and transaction records.

use crate::currency::Currency;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata keys attached to every intent
pub const METADATA_LISTING_ID: &str = "listingId";
pub const METADATA_BUYER_ID: &str = "buyerId";
pub const METADATA_SELLER_ID: &str = "sellerId";

/// Identifiers linking an intent back to the marketplace.
///
/// This is the only linkage the asynchronous webhook has, so all three keys are
/// always written, as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
}

impl PaymentMetadata {
    /// Flatten into the processor's string map
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (METADATA_LISTING_ID.to_string(), self.listing_id.clone()),
            (METADATA_BUYER_ID.to_string(), self.buyer_id.clone()),
            (METADATA_SELLER_ID.to_string(), self.seller_id.clone()),
        ])
    }

    /// Read metadata back from an event.
    ///
    /// `listingId` and `buyerId` are required; `sellerId` may be absent on
    /// intents created before it was attached, in which case it is empty.
    pub fn from_map(map: &HashMap<String, String>) -> MarketResult<Self> {
        let required = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| MarketError::EventParse(format!("missing metadata key {}", key)))
        };

        Ok(Self {
            listing_id: required(METADATA_LISTING_ID)?,
            buyer_id: required(METADATA_BUYER_ID)?,
            seller_id: map.get(METADATA_SELLER_ID).cloned().unwrap_or_default(),
        })
    }
}

/// A request to create one payment intent. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    /// Amount in minor units
    pub amount: i64,
    pub currency: Currency,
    pub metadata: PaymentMetadata,
    /// Forwarded to the processor when the client supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl PaymentIntentRequest {
    pub fn new(amount: i64, currency: Currency, metadata: PaymentMetadata) -> Self {
        Self {
            amount,
            currency,
            metadata,
            idempotency_key: None,
        }
    }

    /// Set idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A payment intent issued by the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor's intent ID
    pub id: String,
    /// Secret the browser uses to confirm the intent
    pub client_secret: String,
    pub amount: i64,
    pub currency: Currency,
}

/// Result of the issuer, returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIntent {
    pub client_secret: String,
    pub listing_id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: Currency,
}

/// Payment event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    /// Intent succeeded; the listing is paid for
    PaymentSucceeded,
    /// Payment attempt failed
    PaymentFailed,
    /// Intent was cancelled
    PaymentCanceled,
    /// Anything else (acknowledged, ignored)
    Unknown(String),
}

impl PaymentEventType {
    /// Map a Stripe-style event type string
    pub fn from_type_str(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => PaymentEventType::PaymentSucceeded,
            "payment_intent.payment_failed" => PaymentEventType::PaymentFailed,
            "payment_intent.canceled" => PaymentEventType::PaymentCanceled,
            other => PaymentEventType::Unknown(other.to_string()),
        }
    }
}

/// A verified, parsed payment event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Event ID from provider
    pub event_id: String,

    pub event_type: PaymentEventType,

    /// Provider name
    pub provider: String,

    /// Related payment intent ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Amount received (in smallest unit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,

    /// Currency code exactly as the processor reported it. Set while
    /// `currency` is `None` when the code is not one we support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,

    /// Intent metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    pub created_at: DateTime<Utc>,
}

/// Record of a completed sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        metadata: &PaymentMetadata,
        payment_intent_id: impl Into<String>,
        amount: i64,
        currency: Currency,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            listing_id: metadata.listing_id.clone(),
            buyer_id: metadata.buyer_id.clone(),
            seller_id: metadata.seller_id.clone(),
            payment_intent_id: payment_intent_id.into(),
            amount,
            currency,
            recorded_at: Utc::now(),
        }
    }
}
