//! # Market Error Types
//!
//! Typed error handling for the checkout workflow.
//! Every operation returns `Result<T, MarketError>`; each variant maps to one
//! HTTP status.

use thiserror::Error;

/// Core error type for listing lookup, intent issuance and reconciliation
#[derive(Debug, Error)]
pub enum MarketError {
    /// Listing does not exist
    #[error("Listing not found: {listing_id}")]
    ListingNotFound { listing_id: String },

    /// Listing exists but can no longer be purchased
    #[error("Listing {listing_id} is not available for purchase (status: {status})")]
    ListingUnavailable { listing_id: String, status: String },

    /// Missing or invalid caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Price could not be converted to a chargeable amount
    #[error("Invalid price: {message}")]
    InvalidPrice { message: String },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),

    /// Verified webhook payload did not have the expected shape
    #[error("Webhook parse error: {0}")]
    EventParse(String),

    /// Payment processor API returned an error
    #[error("Processor error [{provider}]: {message}")]
    ProcessorError { provider: String, message: String },

    /// Network/HTTP error communicating with the processor
    #[error("Network error: {0}")]
    Network(String),

    /// Listing store failure (transient)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for a missing listing
    pub fn not_found(listing_id: impl Into<String>) -> Self {
        MarketError::ListingNotFound {
            listing_id: listing_id.into(),
        }
    }

    /// Returns true if the caller (or the processor, for webhooks) should retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::Network(_) | MarketError::ProcessorError { .. } | MarketError::Storage(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            MarketError::ListingNotFound { .. } => 404,
            MarketError::ListingUnavailable { .. } => 409,
            MarketError::Unauthorized(_) => 401,
            MarketError::InvalidRequest(_) => 400,
            MarketError::InvalidPrice { .. } => 400,
            MarketError::SignatureInvalid(_) => 400,
            MarketError::EventParse(_) => 400,
            MarketError::ProcessorError { .. } => 502,
            MarketError::Network(_) => 503,
            MarketError::Storage(_) => 500,
            MarketError::Configuration(_) => 500,
            MarketError::Internal(_) => 500,
        }
    }
}

/// Result type alias for checkout operations
pub type MarketResult<T> = Result<T, MarketError>;
