//! # Application State
//!
//! Configuration is read once at startup and everything the handlers need is
//! built from it and shared through `AppState`.

use crate::auth::CallerAuthenticator;
use anyhow::Context;
use market_core::{
    BoxedPaymentProcessor, Currency, InMemoryListingStore, ListingSeed, PaymentIntentIssuer,
    SharedListingStore, WebhookReconciler,
};
use market_stripe::StripeProcessor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Currency every payment intent is created in
    pub currency: Currency,
    /// Shared secret for verifying caller tokens
    pub auth_token_secret: String,
    /// Listing seed file
    pub listings_path: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {}", raw))?,
            None => 8080,
        };

        let currency = match lookup("PAYMENT_CURRENCY") {
            Some(raw) => raw.parse::<Currency>()?,
            None => Currency::USD,
        };

        let auth_token_secret = lookup("AUTH_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .context("AUTH_TOKEN_SECRET not set")?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            currency,
            auth_token_secret,
            listings_path: lookup("LISTINGS_PATH")
                .unwrap_or_else(|| "config/listings.toml".to_string()),
            log_format,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Listing lookup
    pub store: SharedListingStore,
    /// Payment intent issuer
    pub issuer: PaymentIntentIssuer,
    /// Webhook verifier and reconciler
    pub reconciler: WebhookReconciler,
    /// Caller token verification
    pub auth: Arc<CallerAuthenticator>,
    /// Key the browser SDK is initialised with
    pub publishable_key: String,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Wire the components around an existing store and processor
    pub fn new(
        config: AppConfig,
        store: SharedListingStore,
        processor: BoxedPaymentProcessor,
        publishable_key: impl Into<String>,
    ) -> Self {
        let issuer = PaymentIntentIssuer::new(store.clone(), processor.clone(), config.currency);
        let reconciler = WebhookReconciler::new(store.clone(), processor, config.currency);
        let auth = Arc::new(CallerAuthenticator::new(&config.auth_token_secret));

        Self {
            store,
            issuer,
            reconciler,
            auth,
            publishable_key: publishable_key.into(),
            config,
        }
    }

    /// Build the production state: listings from the seed file, Stripe from env
    pub fn initialize(config: AppConfig) -> anyhow::Result<Self> {
        let store = load_listing_store(Path::new(&config.listings_path))?;

        let stripe = StripeProcessor::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let publishable_key = stripe.publishable_key().to_string();

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(stripe),
            publishable_key,
        ))
    }
}

/// Load listings from the seed file, or start empty if it does not exist
fn load_listing_store(path: &Path) -> anyhow::Result<InMemoryListingStore> {
    if !path.exists() {
        tracing::warn!("No listing seed at {}, starting with no listings", path.display());
        return Ok(InMemoryListingStore::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let seed = ListingSeed::from_toml(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;

    tracing::info!("Loaded {} listings from {}", seed.listings.len(), path.display());
    Ok(InMemoryListingStore::from_seed(seed))
}
