//! # market-stripe
//!
//! Stripe payment processor for the marketplace checkout workflow.
//!
//! `StripeProcessor` implements `market_core::PaymentProcessor` using the
//! PaymentIntents API:
//! - `create_intent` posts to `/v1/payment_intents` with the listing, buyer and
//!   seller ids as metadata and returns the intent's client secret
//! - `verify_and_parse_event` checks the `Stripe-Signature` header against the
//!   raw body before parsing anything
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use market_stripe::StripeProcessor;
//! use market_core::PaymentProcessor;
//!
//! let processor = StripeProcessor::from_env()?;
//! let intent = processor.create_intent(&request).await?;
//!
//! // In the webhook endpoint, with the untouched body bytes:
//! let event = processor.verify_and_parse_event(&body, signature).await?;
//! ```

pub mod config;
pub mod events;
pub mod processor;
pub mod signature;

// Re-exports
pub use config::StripeConfig;
pub use events::{parse_event, REQUIRED_WEBHOOK_EVENTS};
pub use processor::StripeProcessor;
pub use signature::{sign_payload, verify_signature};
