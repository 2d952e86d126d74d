//! # market-wasm
//!
//! WebAssembly helpers for the marketplace checkout pages.
//!
//! The browser talks to the checkout API directly; these functions keep the
//! request/response shapes and display formatting in one place:
//! - Formatting minor-unit amounts for display
//! - Building the create-payment-intent body and reading its response
//! - Redirect paths for the checkout and success pages
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { create_intent_body, parse_intent_response, format_price } from 'market-wasm';
//!
//! await init();
//!
//! const res = await fetch('/payments/create-payment-intent', {
//!   method: 'POST',
//!   headers: { 'Content-Type': 'application/json', 'x-auth-token': token },
//!   body: create_intent_body('L1'),
//! });
//! const intent = parse_intent_response(await res.text());
//! console.log('Pay', format_price(intent.amount, intent.currency));
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

const MAX_LISTING_ID_LEN: usize = 100;

/// Intent details returned by `POST /payments/create-payment-intent`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[wasm_bindgen(getter_with_clone)]
pub struct WasmIssuedIntent {
    pub client_secret: String,
    pub listing_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIntentBody<'a> {
    listing_id: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

fn decimal_places(currency: &str) -> u32 {
    match currency.to_ascii_lowercase().as_str() {
        "jpy" => 0,
        _ => 2,
    }
}

/// Display prefix, matching the server's `Currency::format_minor`
fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_ascii_lowercase().as_str() {
        "usd" => Some("$"),
        "eur" => Some("€"),
        "gbp" => Some("£"),
        "jpy" => Some("¥"),
        "cad" => Some("C$"),
        "aud" => Some("A$"),
        "chf" => Some("CHF "),
        "mxn" => Some("MX$"),
        _ => None,
    }
}

/// Format a minor-unit amount for display, e.g. `4999, "usd"` -> `$49.99`
#[wasm_bindgen]
pub fn format_price(minor: i64, currency: &str) -> String {
    let places = decimal_places(currency);
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();

    let number = if places == 0 {
        abs.to_string()
    } else {
        let divisor = 10u64.pow(places);
        format!(
            "{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = places as usize
        )
    };

    match currency_symbol(currency) {
        Some(symbol) => format!("{}{}{}", sign, symbol, number),
        None => format!("{}{} {}", sign, number, currency.to_ascii_uppercase()),
    }
}

/// Validate a listing ID format
#[wasm_bindgen]
pub fn validate_listing_id(listing_id: &str) -> bool {
    !listing_id.is_empty()
        && listing_id.len() <= MAX_LISTING_ID_LEN
        && listing_id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn intent_body(listing_id: &str) -> Result<String, String> {
    if !validate_listing_id(listing_id) {
        return Err(format!("Invalid listing id: {:?}", listing_id));
    }
    serde_json::to_string(&CreateIntentBody { listing_id }).map_err(|e| e.to_string())
}

/// JSON body for the create-payment-intent request
#[wasm_bindgen]
pub fn create_intent_body(listing_id: &str) -> Result<String, JsValue> {
    intent_body(listing_id).map_err(|e| JsValue::from_str(&e))
}

fn intent_response(json: &str) -> Result<WasmIssuedIntent, String> {
    if let Ok(intent) = serde_json::from_str::<WasmIssuedIntent>(json) {
        return Ok(intent);
    }

    match serde_json::from_str::<ApiErrorBody>(json) {
        Ok(body) => Err(body.error),
        Err(e) => Err(format!("Unexpected response: {}", e)),
    }
}

/// Parse the create-payment-intent response. API errors are surfaced with the
/// server's message.
#[wasm_bindgen]
pub fn parse_intent_response(json: &str) -> Result<WasmIssuedIntent, JsValue> {
    intent_response(json).map_err(|e| JsValue::from_str(&e))
}

fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Page the buyer lands on after confirming payment
#[wasm_bindgen]
pub fn success_path(listing_id: &str) -> String {
    format!(
        "/listings/checkout/success?listingId={}",
        encode_query_value(listing_id)
    )
}

/// Checkout page for a listing
#[wasm_bindgen]
pub fn checkout_path(listing_id: &str) -> String {
    format!("/listings/{}/checkout", encode_query_value(listing_id))
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
