//! # Listing Store
//!
//! Persistence seam for listings and sale records, plus an in-memory
//! implementation used by the server and the tests.

use crate::error::{MarketError, MarketResult};
use crate::listing::{Listing, ListingSeed, ListingStatus};
use crate::payment::TransactionRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a conditional sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleOutcome {
    /// Listing went `active -> sold` and the record was stored
    Completed(TransactionRecord),
    /// Listing was already sold; nothing was written
    AlreadySold {
        /// Intent recorded with the earlier sale, if known
        payment_intent_id: Option<String>,
    },
}

/// Storage for listings and their sale records.
///
/// `mark_sold` must be a single conditional update: read the status, transition
/// only if still `Active`, and store the record in the same step. Two
/// concurrent calls for one listing yield exactly one `Completed`.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Fetch a listing. Missing listings are `ListingNotFound`; backend
    /// failures are `Storage`.
    async fn get_listing(&self, id: &str) -> MarketResult<Listing>;

    /// Atomically mark the record's listing sold and store the record.
    async fn mark_sold(&self, record: TransactionRecord) -> MarketResult<SaleOutcome>;

    /// Sale records for one listing
    async fn transactions_for(&self, listing_id: &str) -> MarketResult<Vec<TransactionRecord>>;
}

/// Type alias for a shared listing store
pub type SharedListingStore = Arc<dyn ListingStore>;

#[derive(Debug, Default)]
struct StoreInner {
    listings: HashMap<String, Listing>,
    transactions: Vec<TransactionRecord>,
}

/// Listing store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a parsed seed file
    pub fn from_seed(seed: ListingSeed) -> Self {
        let listings = seed
            .listings
            .into_iter()
            .map(|listing| (listing.id.clone(), listing))
            .collect();

        Self {
            inner: RwLock::new(StoreInner {
                listings,
                transactions: Vec::new(),
            }),
        }
    }

    /// Insert or replace a listing
    pub async fn insert(&self, listing: Listing) {
        let mut inner = self.inner.write().await;
        inner.listings.insert(listing.id.clone(), listing);
    }

    /// Number of listings held
    pub async fn len(&self) -> usize {
        self.inner.read().await.listings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn get_listing(&self, id: &str) -> MarketResult<Listing> {
        let inner = self.inner.read().await;
        inner
            .listings
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(id))
    }

    async fn mark_sold(&self, record: TransactionRecord) -> MarketResult<SaleOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let listing = inner
            .listings
            .get_mut(&record.listing_id)
            .ok_or_else(|| MarketError::not_found(&record.listing_id))?;

        if listing.status != ListingStatus::Active {
            let payment_intent_id = inner
                .transactions
                .iter()
                .find(|t| t.listing_id == record.listing_id)
                .map(|t| t.payment_intent_id.clone());
            return Ok(SaleOutcome::AlreadySold { payment_intent_id });
        }

        listing.status = ListingStatus::Sold;
        inner.transactions.push(record.clone());
        Ok(SaleOutcome::Completed(record))
    }

    async fn transactions_for(&self, listing_id: &str) -> MarketResult<Vec<TransactionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.listing_id == listing_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::payment::PaymentMetadata;
    use rust_decimal::Decimal;

    fn record(intent: &str) -> TransactionRecord {
        let metadata = PaymentMetadata {
            listing_id: "L1".to_string(),
            buyer_id: "buyer1".to_string(),
            seller_id: "seller1".to_string(),
        };
        TransactionRecord::new(&metadata, intent, 4999, Currency::USD)
    }

    async fn store() -> InMemoryListingStore {
        let store = InMemoryListingStore::new();
        store
            .insert(Listing::new("L1", "Desk lamp", Decimal::new(4999, 2), "seller1"))
            .await;
        store
    }

    #[tokio::test]
    async fn test_get_missing_listing() {
        let store = store().await;
        let err = store.get_listing("nope").await.unwrap_err();
        assert!(matches!(err, MarketError::ListingNotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_sold_once() {
        let store = store().await;

        let first = store.mark_sold(record("pi_1")).await.unwrap();
        assert!(matches!(first, SaleOutcome::Completed(_)));

        let second = store.mark_sold(record("pi_1")).await.unwrap();
        assert_eq!(
            second,
            SaleOutcome::AlreadySold {
                payment_intent_id: Some("pi_1".to_string())
            }
        );

        assert_eq!(store.get_listing("L1").await.unwrap().status, ListingStatus::Sold);
        assert_eq!(store.transactions_for("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_mark_sold_single_winner() {
        let store = Arc::new(store().await);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.mark_sold(record(&format!("pi_{}", i))).await })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            if let SaleOutcome::Completed(_) = handle.await.unwrap().unwrap() {
                completed += 1;
            }
        }

        assert_eq!(completed, 1);
        assert_eq!(store.transactions_for("L1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_sold_missing_listing() {
        let store = InMemoryListingStore::new();
        let err = store.mark_sold(record("pi_1")).await.unwrap_err();
        assert!(matches!(err, MarketError::ListingNotFound { .. }));
    }
}
