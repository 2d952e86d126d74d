//! # Payment Intent Issuer
//!
//! Turns "buyer wants listing X" into a processor payment intent tagged with
//! the listing, buyer and seller identifiers.

use crate::currency::Currency;
use crate::error::{MarketError, MarketResult};
use crate::payment::{IssuedIntent, PaymentIntentRequest, PaymentMetadata};
use crate::processor::BoxedPaymentProcessor;
use crate::store::SharedListingStore;
use tracing::{debug, error, info, instrument};

/// Issues payment intents for listings
#[derive(Clone)]
pub struct PaymentIntentIssuer {
    store: SharedListingStore,
    processor: BoxedPaymentProcessor,
    currency: Currency,
}

impl PaymentIntentIssuer {
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

    /// Currency every intent is created in
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Create a payment intent for `listing_id` on behalf of `buyer_id`.
    ///
    /// The listing is looked up first; a missing listing never reaches the
    /// processor.
    #[instrument(skip(self, idempotency_key), fields(provider = self.processor.provider_name()))]
    pub async fn create_payment_intent(
        &self,
        listing_id: &str,
        buyer_id: &str,
        idempotency_key: Option<String>,
    ) -> MarketResult<IssuedIntent> {
        if listing_id.trim().is_empty() {
            return Err(MarketError::InvalidRequest("listingId is required".to_string()));
        }
        if buyer_id.trim().is_empty() {
            return Err(MarketError::Unauthorized("missing buyer identity".to_string()));
        }

        let listing = self.store.get_listing(listing_id).await?;
        listing.ensure_purchasable()?;

        let amount = listing.amount_in(self.currency)?;
        if amount <= 0 {
            return Err(MarketError::InvalidPrice {
                message: format!("listing {} has no chargeable amount", listing.id),
            });
        }

        let metadata = PaymentMetadata {
            listing_id: listing.id.clone(),
            buyer_id: buyer_id.to_string(),
            seller_id: listing.seller_id.clone(),
        };

        let mut request = PaymentIntentRequest::new(amount, self.currency, metadata);
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }

        debug!(amount, currency = %self.currency, "Requesting payment intent");

        let intent = self.processor.create_intent(&request).await.map_err(|e| {
            error!("Failed to create payment intent: {}", e);
            e
        })?;

        info!(
            intent_id = %intent.id,
            amount = intent.amount,
            "Created payment intent for listing {}",
            listing.id
        );

        Ok(IssuedIntent {
            client_secret: intent.client_secret,
            listing_id: listing.id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }
}
