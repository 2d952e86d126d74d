//! # Caller Authentication
//!
//! Verifies the identity of the buyer calling authenticated routes.
//! Tokens are issued by the marketplace's account service and look like
//! `<user_id>.<hex HMAC-SHA256(user_id)>`; this service only checks them.
//!
//! Accepted headers: `x-auth-token: <token>` or `Authorization: Bearer <token>`.

use crate::handlers::{market_error_to_response, ApiError};
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use market_core::{MarketError, MarketResult};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header the checkout pages send the token in
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Verifies caller tokens against the shared secret
pub struct CallerAuthenticator {
    secret: Vec<u8>,
}

impl CallerAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Verify a token and return the user id it carries
    pub fn verify(&self, token: &str) -> MarketResult<String> {
        let (user_id, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| MarketError::Unauthorized("Malformed token".to_string()))?;

        if user_id.is_empty() {
            return Err(MarketError::Unauthorized("Malformed token".to_string()));
        }

        let signature = hex::decode(signature)
            .map_err(|_| MarketError::Unauthorized("Malformed token".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MarketError::Configuration(format!("invalid auth secret: {}", e)))?;
        mac.update(user_id.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| MarketError::Unauthorized("Invalid token".to_string()))?;

        Ok(user_id.to_string())
    }
}

/// Pull the raw token out of the request headers
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verified caller identity, available as a handler argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(|| {
            market_error_to_response(MarketError::Unauthorized(
                "No token, authorization denied".to_string(),
            ))
        })?;

        let user_id = state.auth.verify(token).map_err(|e| {
            warn!(path = %parts.uri.path(), "Rejected caller token: {}", e);
            market_error_to_response(e)
        })?;

        Ok(Self { user_id })
    }
}
