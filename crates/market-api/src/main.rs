//! # Market Checkout
//!
//! Listing checkout service: issues payment intents and reconciles processor
//! webhooks.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export AUTH_TOKEN_SECRET=...
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//!
//! # Run the server
//! market-checkout
//! ```

use market_api::{routes, AppConfig, AppState, LogFormat};
use market_stripe::REQUIRED_WEBHOOK_EVENTS;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    init_tracing(config.log_format);

    print_banner();

    let addr = config.socket_addr()?;
    let is_prod = config.is_production();
    let state = AppState::initialize(config)?;

    info!("Environment: {}", state.config.environment);
    info!("Payment currency: {}", state.issuer.currency());
    info!("Webhook events to enable: {}", REQUIRED_WEBHOOK_EVENTS.join(", "));

    let app = routes::create_router(state);

    info!("Market checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Intent: POST http://{}/payments/create-payment-intent", addr);
        info!("Webhook: POST http://{}/payments/webhook", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

fn print_banner() {
    println!(
        r#"
  Market Checkout
  ━━━━━━━━━━━━━━━━━━━━━━━
  Listing payments service
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
