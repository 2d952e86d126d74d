//! # Webhook Signature Verification
//!
//! Stripe signs each delivery with `Stripe-Signature: t=<unix>,v1=<hex>`, where
//! the `v1` value is HMAC-SHA256 over `"{t}." ++ raw_body` keyed with the
//! endpoint's signing secret. Verification runs on the exact bytes received.

use hmac::{Hmac, Mac};
use market_core::{MarketError, MarketResult};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Decoded `v1` signatures (several during secret rotation)
    pub signatures: Vec<Vec<u8>>,
}

/// Parse a `t=...,v1=...` header. Unknown schemes (`v0`) are skipped.
pub fn parse_signature_header(header: &str) -> MarketResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        MarketError::SignatureInvalid("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(MarketError::SignatureInvalid(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> MarketResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| MarketError::Configuration(format!("invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verify `header` against `payload`.
///
/// Signatures are compared in constant time. A timestamp further than
/// `tolerance_secs` from `now` is rejected even when the signature matches.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> MarketResult<()> {
    let parsed = parse_signature_header(header)?;
    let mac = signing_mac(secret, parsed.timestamp, payload)?;

    let valid = parsed
        .signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok());

    if !valid {
        return Err(MarketError::SignatureInvalid(
            "Signature mismatch".to_string(),
        ));
    }

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(MarketError::SignatureInvalid(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    Ok(())
}

/// Produce a `Stripe-Signature` header value for `payload`.
///
/// Used for local replay of captured events and in tests.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> MarketResult<String> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}
