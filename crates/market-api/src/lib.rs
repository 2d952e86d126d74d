//! # market-api
//!
//! HTTP API layer for the marketplace checkout service.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Listing lookup endpoints
//! - Payment intent creation for authenticated buyers
//! - Signed webhook handling that marks listings sold
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/listings/{id}` | Get listing |
//! | GET | `/listings/{id}/status` | Get listing status |
//! | GET | `/payments/config` | Publishable key and currency |
//! | POST | `/payments/create-payment-intent` | Create payment intent (auth) |
//! | POST | `/payments/webhook` | Processor webhook |

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedCaller, CallerAuthenticator};
pub use routes::create_router;
pub use state::{AppConfig, AppState, LogFormat};
