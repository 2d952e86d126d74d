//! # Payment Processor Trait
//!
//! Capability interface for the external payment processor.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentProcessor (trait)                   │
//! │  ├── create_intent()                                        │
//! │  ├── verify_and_parse_event()                               │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                   ┌────────┴────────┐
//!                   │ StripeProcessor │
//!                   └─────────────────┘
//! ```

use crate::error::MarketResult;
use crate::payment::{PaymentEvent, PaymentIntent, PaymentIntentRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the checkout workflow needs from a payment processor.
///
/// Implementations own their credentials (API key, webhook signing secret),
/// which are injected at construction.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create one payment intent for `request.amount` minor units.
    ///
    /// Every call creates a new intent unless the request carries an
    /// idempotency key the processor has already seen.
    async fn create_intent(&self, request: &PaymentIntentRequest) -> MarketResult<PaymentIntent>;

    /// Verify a webhook signature against the raw body, then parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes, exactly as received
    /// * `signature` - Signature header from the request
    ///
    /// Returns `MarketError::SignatureInvalid` before looking at the payload
    /// contents when verification fails.
    async fn verify_and_parse_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> MarketResult<PaymentEvent>;

    /// Get the provider name (for logging and transaction records).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment processor (dynamic dispatch)
pub type BoxedPaymentProcessor = Arc<dyn PaymentProcessor>;
