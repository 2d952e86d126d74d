//! # Webhook Reconciliation
//!
//! Verifies inbound processor notifications and applies their business effect:
//! a succeeded payment marks its listing sold and records the transaction.
//!
//! ```text
//! raw body + signature
//!       |
//!       v
//! [verify_and_parse_event] --> SignatureInvalid (400, no side effect)
//!       |
//!       v
//! [match event type] --> other types: NoAction
//!       |
//!       v
//! [mark_sold (conditional)] --> Sold | Duplicate | SoldToOther
//! ```
//!
//! Deliveries are at-least-once, so applying the same event twice must be
//! harmless. Storage failures are returned as errors so the processor retries.

use crate::currency::Currency;
use crate::error::{MarketError, MarketResult};
use crate::payment::{PaymentEvent, PaymentEventType, PaymentMetadata, TransactionRecord};
use crate::processor::BoxedPaymentProcessor;
use crate::store::{SaleOutcome, SharedListingStore};
use tracing::{debug, error, info, instrument, warn};

/// What reconciling one verified event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Listing transitioned to sold; record stored
    Sold(TransactionRecord),
    /// Same intent already reconciled; nothing changed
    Duplicate { listing_id: String },
    /// Listing was sold through a different intent; nothing changed
    SoldToOther {
        listing_id: String,
        payment_intent_id: Option<String>,
    },
    /// Event does not refer to a listing we can act on
    Ignored { reason: String },
    /// Event type has no business effect
    NoAction { event_type: PaymentEventType },
}

impl Reconciliation {
    /// True when listing state changed
    pub fn changed_state(&self) -> bool {
        matches!(self, Reconciliation::Sold(_))
    }
}

/// Verifies webhooks and reconciles them against listings
#[derive(Clone)]
pub struct WebhookReconciler {
    store: SharedListingStore,
    processor: BoxedPaymentProcessor,
    currency: Currency,
}

impl WebhookReconciler {
    pub fn new(
        store: SharedListingStore,
        processor: BoxedPaymentProcessor,
        currency: Currency,
    ) -> Self {
        Self {
            store,
            processor,
            currency,
        }
    }

    /// Verify `payload` against `signature`, then reconcile the event.
    ///
    /// The payload must be the unmodified request body.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> MarketResult<Reconciliation> {
        let event = self
            .processor
            .verify_and_parse_event(payload, signature)
            .await?;

        info!(
            event_id = %event.event_id,
            event_type = ?event.event_type,
            "Received verified webhook"
        );

        self.reconcile(&event).await
    }

    /// Apply the business effect of an already verified event
    pub async fn reconcile(&self, event: &PaymentEvent) -> MarketResult<Reconciliation> {
        match &event.event_type {
            PaymentEventType::PaymentSucceeded => self.on_payment_succeeded(event).await,
            PaymentEventType::PaymentFailed | PaymentEventType::PaymentCanceled => {
                warn!(
                    intent_id = ?event.payment_intent_id,
                    listing_id = ?event.metadata.get(crate::payment::METADATA_LISTING_ID),
                    "Payment did not complete: {:?}",
                    event.event_type
                );
                Ok(Reconciliation::NoAction {
                    event_type: event.event_type.clone(),
                })
            }
            PaymentEventType::Unknown(kind) => {
                debug!("Unhandled webhook event: {}", kind);
                Ok(Reconciliation::NoAction {
                    event_type: event.event_type.clone(),
                })
            }
        }
    }

    async fn on_payment_succeeded(&self, event: &PaymentEvent) -> MarketResult<Reconciliation> {
        let intent_id = event.payment_intent_id.clone().ok_or_else(|| {
            MarketError::EventParse("succeeded event without payment intent id".to_string())
        })?;

        let mut metadata = match PaymentMetadata::from_map(&event.metadata) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(intent_id = %intent_id, "Ignoring succeeded payment: {}", e);
                return Ok(Reconciliation::Ignored {
                    reason: e.to_string(),
                });
            }
        };

        let listing = match self.store.get_listing(&metadata.listing_id).await {
            Ok(listing) => listing,
            Err(MarketError::ListingNotFound { listing_id }) => {
                error!(
                    intent_id = %intent_id,
                    "Payment succeeded for unknown listing {}",
                    listing_id
                );
                return Ok(Reconciliation::Ignored {
                    reason: format!("listing {} not found", listing_id),
                });
            }
            Err(e) => return Err(e),
        };

        if metadata.seller_id.is_empty() {
            metadata.seller_id = listing.seller_id.clone();
        }

        let currency = match (event.currency, event.currency_code.as_deref()) {
            (Some(currency), _) => currency,
            (None, Some(code)) => {
                error!(
                    intent_id = %intent_id,
                    "Payment for listing {} settled in unsupported currency {}",
                    metadata.listing_id,
                    code
                );
                return Ok(Reconciliation::Ignored {
                    reason: format!("unsupported currency {}", code),
                });
            }
            (None, None) => self.currency,
        };
        let expected = listing.amount_in(currency)?;
        let amount = match event.amount {
            Some(paid) => {
                if paid != expected {
                    warn!(
                        intent_id = %intent_id,
                        paid,
                        expected,
                        "Paid amount differs from current listing price"
                    );
                }
                paid
            }
            None => expected,
        };

        let record = TransactionRecord::new(&metadata, &intent_id, amount, currency);

        match self.store.mark_sold(record).await {
            Ok(SaleOutcome::Completed(record)) => {
                info!(
                    transaction_id = %record.id,
                    buyer_id = %record.buyer_id,
                    "Listing {} sold for {}",
                    record.listing_id,
                    record.currency.format_minor(record.amount)
                );
                Ok(Reconciliation::Sold(record))
            }
            Ok(SaleOutcome::AlreadySold { payment_intent_id })
                if payment_intent_id.as_deref() == Some(intent_id.as_str()) =>
            {
                info!(
                    intent_id = %intent_id,
                    "Duplicate delivery for listing {}",
                    metadata.listing_id
                );
                Ok(Reconciliation::Duplicate {
                    listing_id: metadata.listing_id,
                })
            }
            Ok(SaleOutcome::AlreadySold { payment_intent_id }) => {
                error!(
                    intent_id = %intent_id,
                    earlier_intent_id = ?payment_intent_id,
                    "Listing {} already sold through another payment",
                    metadata.listing_id
                );
                Ok(Reconciliation::SoldToOther {
                    listing_id: metadata.listing_id,
                    payment_intent_id,
                })
            }
            Err(MarketError::ListingNotFound { listing_id }) => {
                Ok(Reconciliation::Ignored {
                    reason: format!("listing {} not found", listing_id),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Listing, ListingStatus};
    use crate::payment::{PaymentIntent, PaymentIntentRequest};
    use crate::processor::PaymentProcessor;
    use crate::store::{InMemoryListingStore, ListingStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Accepts payloads whose signature is "valid" and parses them as JSON events
    struct FakeProcessor;

    #[async_trait]
    impl PaymentProcessor for FakeProcessor {
        async fn create_intent(&self, _: &PaymentIntentRequest) -> MarketResult<PaymentIntent> {
            Err(MarketError::Internal("not used".to_string()))
        }

        async fn verify_and_parse_event(
            &self,
            payload: &[u8],
            signature: &str,
        ) -> MarketResult<PaymentEvent> {
            if signature != "valid" {
                return Err(MarketError::SignatureInvalid("Signature mismatch".to_string()));
            }
            serde_json::from_slice(payload).map_err(|e| MarketError::EventParse(e.to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    /// Serves listing L1 but fails every write
    struct FailingStore;

    #[async_trait]
    impl ListingStore for FailingStore {
        async fn get_listing(&self, id: &str) -> MarketResult<Listing> {
            Ok(Listing::new(id, "Desk lamp", Decimal::new(4999, 2), "seller1"))
        }

        async fn mark_sold(&self, _: TransactionRecord) -> MarketResult<SaleOutcome> {
            Err(MarketError::Storage("db down".to_string()))
        }

        async fn transactions_for(&self, _: &str) -> MarketResult<Vec<TransactionRecord>> {
            Ok(Vec::new())
        }
    }

    fn succeeded(listing_id: &str, intent: &str) -> PaymentEvent {
        let metadata = HashMap::from([
            ("listingId".to_string(), listing_id.to_string()),
            ("buyerId".to_string(), "buyer1".to_string()),
            ("sellerId".to_string(), "seller1".to_string()),
        ]);
        PaymentEvent {
            event_id: format!("evt_{}", intent),
            event_type: PaymentEventType::PaymentSucceeded,
            provider: "fake".to_string(),
            payment_intent_id: Some(intent.to_string()),
            amount: Some(4999),
            currency: Some(Currency::USD),
            currency_code: Some("usd".to_string()),
            metadata,
            created_at: Utc::now(),
        }
    }

    async fn setup() -> (WebhookReconciler, Arc<InMemoryListingStore>) {
        let store = Arc::new(InMemoryListingStore::new());
        store
            .insert(Listing::new("L1", "Desk lamp", Decimal::new(4999, 2), "seller1"))
            .await;
        let reconciler = WebhookReconciler::new(store.clone(), Arc::new(FakeProcessor), Currency::USD);
        (reconciler, store)
    }

    #[tokio::test]
    async fn test_succeeded_event_marks_sold() {
        let (reconciler, store) = setup().await;

        let outcome = reconciler.reconcile(&succeeded("L1", "pi_1")).await.unwrap();

        let record = match outcome {
            Reconciliation::Sold(record) => record,
            other => panic!("expected sale, got {:?}", other),
        };
        assert_eq!(record.listing_id, "L1");
        assert_eq!(record.buyer_id, "buyer1");
        assert_eq!(record.amount, 4999);
        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Sold);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_noop() {
        let (reconciler, store) = setup().await;
        let event = succeeded("L1", "pi_1");

        let first = reconciler.reconcile(&event).await.unwrap();
        let second = reconciler.reconcile(&event).await.unwrap();
        let third = reconciler.reconcile(&event).await.unwrap();

        assert!(first.changed_state());
        assert_eq!(second, Reconciliation::Duplicate { listing_id: "L1".to_string() });
        assert_eq!(third, Reconciliation::Duplicate { listing_id: "L1".to_string() });
        assert_eq!(store.transactions_for("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_deliveries() {
        let (reconciler, store) = setup().await;
        let event = succeeded("L1", "pi_1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = reconciler.clone();
                let event = event.clone();
                tokio::spawn(async move { reconciler.reconcile(&event).await })
            })
            .collect();

        let mut sold = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().changed_state() {
                sold += 1;
            }
        }

        assert_eq!(sold, 1);
        assert_eq!(store.transactions_for("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_intent_for_sold_listing() {
        let (reconciler, store) = setup().await;

        reconciler.reconcile(&succeeded("L1", "pi_1")).await.unwrap();
        let outcome = reconciler.reconcile(&succeeded("L1", "pi_2")).await.unwrap();

        assert_eq!(
            outcome,
            Reconciliation::SoldToOther {
                listing_id: "L1".to_string(),
                payment_intent_id: Some("pi_1".to_string()),
            }
        );
        assert_eq!(store.transactions_for("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable_error() {
        let reconciler =
            WebhookReconciler::new(Arc::new(FailingStore), Arc::new(FakeProcessor), Currency::USD);

        let err = reconciler.reconcile(&succeeded("L1", "pi_1")).await.unwrap_err();

        assert!(matches!(err, MarketError::Storage(_)));
        assert_eq!(err.status_code(), 500);
        assert!(err.is_retryable());

        let payload = serde_json::to_vec(&succeeded("L1", "pi_1")).unwrap();
        let err = reconciler.handle_webhook(&payload, "valid").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_unsupported_currency_ignored() {
        let (reconciler, store) = setup().await;
        let mut event = succeeded("L1", "pi_1");
        event.currency = None;
        event.currency_code = Some("sek".to_string());

        let outcome = reconciler.reconcile(&event).await.unwrap();

        assert!(matches!(outcome, Reconciliation::Ignored { .. }));
        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Active);
        assert!(store.transactions_for("L1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_currency_uses_configured() {
        let (reconciler, store) = setup().await;
        let mut event = succeeded("L1", "pi_1");
        event.currency = None;
        event.currency_code = None;

        assert!(reconciler.reconcile(&event).await.unwrap().changed_state());
        let records = store.transactions_for("L1").await.unwrap();
        assert_eq!(records[0].currency, Currency::USD);
    }

    #[tokio::test]
    async fn test_unknown_listing_ignored() {
        let (reconciler, _) = setup().await;
        let outcome = reconciler.reconcile(&succeeded("L404", "pi_1")).await.unwrap();
        assert!(matches!(outcome, Reconciliation::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_missing_metadata_ignored() {
        let (reconciler, store) = setup().await;
        let mut event = succeeded("L1", "pi_1");
        event.metadata.clear();

        let outcome = reconciler.reconcile(&event).await.unwrap();

        assert!(matches!(outcome, Reconciliation::Ignored { .. }));
        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_other_events_acknowledged_without_effect() {
        let (reconciler, store) = setup().await;
        let mut event = succeeded("L1", "pi_1");
        event.event_type = PaymentEventType::PaymentFailed;

        let outcome = reconciler.reconcile(&event).await.unwrap();
        assert!(matches!(outcome, Reconciliation::NoAction { .. }));

        event.event_type = PaymentEventType::Unknown("charge.refunded".to_string());
        let outcome = reconciler.reconcile(&event).await.unwrap();
        assert!(matches!(outcome, Reconciliation::NoAction { .. }));

        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_invalid_signature_changes_nothing() {
        let (reconciler, store) = setup().await;
        let payload = serde_json::to_vec(&succeeded("L1", "pi_1")).unwrap();

        let err = reconciler.handle_webhook(&payload, "forged").await.unwrap_err();

        assert!(matches!(err, MarketError::SignatureInvalid(_)));
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_handle_webhook_verified() {
        let (reconciler, _) = setup().await;
        let payload = serde_json::to_vec(&succeeded("L1", "pi_1")).unwrap();

        let outcome = reconciler.handle_webhook(&payload, "valid").await.unwrap();
        assert!(outcome.changed_state());
    }
}
