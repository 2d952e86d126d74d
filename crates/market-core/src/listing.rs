//! # Listing Types
//!
//! Sellable item records. Listings are seeded from `config/listings.toml`.

use crate::currency::Currency;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a listing.
///
/// The only transition this workflow performs is `Active -> Sold`, and `Sold`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Available for purchase
    Active,
    /// Purchased; terminal
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
        }
    }
}

impl Default for ListingStatus {
    fn default() -> Self {
        ListingStatus::Active
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing in the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique listing identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Price in major units of the configured currency
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Owning user (the seller)
    pub seller_id: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: ListingStatus,

    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Create a new active listing
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        seller_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            price,
            seller_id: seller_id.into(),
            status: ListingStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Builder: set status
    pub fn with_status(mut self, status: ListingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    /// Amount to charge for this listing, in minor units of `currency`
    pub fn amount_in(&self, currency: Currency) -> MarketResult<i64> {
        currency.to_minor_units(self.price)
    }

    /// Reject listings that can no longer be bought
    pub fn ensure_purchasable(&self) -> MarketResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(MarketError::ListingUnavailable {
                listing_id: self.id.clone(),
                status: self.status.to_string(),
            })
        }
    }

    /// Reduced view used by the status endpoint
    pub fn status_view(&self) -> ListingStatusView {
        ListingStatusView {
            id: self.id.clone(),
            status: self.status,
        }
    }

    fn validate(&self) -> MarketResult<()> {
        if self.id.trim().is_empty() {
            return Err(MarketError::InvalidRequest("listing id is empty".to_string()));
        }
        if self.seller_id.trim().is_empty() {
            return Err(MarketError::InvalidRequest(format!(
                "listing {} has no seller",
                self.id
            )));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(MarketError::InvalidPrice {
                message: format!("listing {} has negative price {}", self.id, self.price),
            });
        }
        Ok(())
    }
}

/// Limited listing info (id and status only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStatusView {
    pub id: String,
    pub status: ListingStatus,
}

/// Listing seed file (`config/listings.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSeed {
    #[serde(default)]
    pub listings: Vec<Listing>,
}

impl ListingSeed {
    /// Parse and validate a seed file
    pub fn from_toml(toml_str: &str) -> MarketResult<Self> {
        let seed: ListingSeed = toml::from_str(toml_str)
            .map_err(|e| MarketError::Configuration(format!("invalid listing seed: {}", e)))?;
        for listing in &seed.listings {
            listing.validate()?;
        }
        Ok(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_listing_amount() {
        let listing = Listing::new("L1", "Desk lamp", Decimal::from_str("49.99").unwrap(), "seller1");
        assert_eq!(listing.amount_in(Currency::USD).unwrap(), 4999);
        assert!(listing.is_active());
    }

    #[test]
    fn test_sold_listing_not_purchasable() {
        let listing = Listing::new("L1", "Desk lamp", Decimal::from(10), "seller1")
            .with_status(ListingStatus::Sold);
        let err = listing.ensure_purchasable().unwrap_err();
        assert!(matches!(err, MarketError::ListingUnavailable { .. }));
    }

    #[test]
    fn test_listing_json_shape() {
        let listing = Listing::new("L1", "Desk lamp", Decimal::from_str("49.99").unwrap(), "seller1");
        let json = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["id"], "L1");
        assert_eq!(json["price"], 49.99);
        assert_eq!(json["sellerId"], "seller1");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_seed_from_toml() {
        let seed = ListingSeed::from_toml(
            r#"
            [[listings]]
            id = "L1"
            title = "Desk lamp"
            price = 49.99
            sellerId = "seller1"

            [[listings]]
            id = "L2"
            title = "Bookshelf"
            price = 120.0
            sellerId = "seller2"
            status = "sold"
            "#,
        )
        .unwrap();

        assert_eq!(seed.listings.len(), 2);
        assert_eq!(seed.listings[0].price, Decimal::from_str("49.99").unwrap());
        assert_eq!(seed.listings[1].status, ListingStatus::Sold);
    }

    #[test]
    fn test_seed_rejects_negative_price() {
        let result = ListingSeed::from_toml(
            r#"
            [[listings]]
            id = "L1"
            title = "Broken"
            price = -1.0
            sellerId = "seller1"
            "#,
        );
        assert!(matches!(result, Err(MarketError::InvalidPrice { .. })));
    }
}
