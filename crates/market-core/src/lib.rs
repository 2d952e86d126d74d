//! # market-core
//!
//! Core types and traits for the marketplace checkout workflow.
//!
//! This crate provides:
//! - `Listing` and `ListingStore` for listing lookup (with an in-memory store)
//! - `PaymentProcessor` trait for the external payment processor
//! - `PaymentIntentIssuer` for creating intents tagged with listing/buyer/seller ids
//! - `WebhookReconciler` for verifying webhooks and marking listings sold
//! - `MarketError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use market_core::{Currency, InMemoryListingStore, PaymentIntentIssuer, WebhookReconciler};
//!
//! let store = Arc::new(InMemoryListingStore::from_seed(seed));
//! let issuer = PaymentIntentIssuer::new(store.clone(), processor.clone(), Currency::USD);
//! let reconciler = WebhookReconciler::new(store, processor, Currency::USD);
//!
//! // Checkout page asks for a client secret
//! let issued = issuer.create_payment_intent("L1", "buyer1", None).await?;
//!
//! // Processor later calls back with the raw body and its signature header
//! let outcome = reconciler.handle_webhook(&body, signature).await?;
//! ```

pub mod currency;
pub mod error;
pub mod issuer;
pub mod listing;
pub mod payment;
pub mod processor;
pub mod reconcile;
pub mod store;

// Re-exports for convenience
pub use currency::Currency;
pub use error::{MarketError, MarketResult};
pub use issuer::PaymentIntentIssuer;
pub use listing::{Listing, ListingSeed, ListingStatus, ListingStatusView};
pub use payment::{
    IssuedIntent, PaymentEvent, PaymentEventType, PaymentIntent, PaymentIntentRequest,
    PaymentMetadata, TransactionRecord,
};
pub use processor::{BoxedPaymentProcessor, PaymentProcessor};
pub use reconcile::{Reconciliation, WebhookReconciler};
pub use store::{InMemoryListingStore, ListingStore, SaleOutcome, SharedListingStore};
