//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Listings:
///   - GET  /listings/{id} - Listing details
///   - GET  /listings/{id}/status - Listing status only
///
/// - Payments:
///   - GET  /payments/config - Publishable key and currency
///   - POST /payments/create-payment-intent - Create intent (requires caller token)
///   - POST /payments/webhook - Processor webhook (raw body, signed)
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let listing_routes = Router::new()
        .route("/{listing_id}", get(handlers::get_listing))
        .route("/{listing_id}/status", get(handlers::get_listing_status));

    let payment_routes = Router::new()
        .route("/config", get(handlers::payment_config))
        .route(
            "/create-payment-intent",
            post(handlers::create_payment_intent),
        )
        .route("/webhook", post(handlers::payment_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/listings", listing_routes)
        .nest("/payments", payment_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
