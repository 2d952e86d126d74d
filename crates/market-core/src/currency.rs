//! # Currency
//!
//! Currency handling and the conversion from listing prices (exact decimals)
//! to the integer minor units the payment processor charges.
//!
//! Rounding rule: fractional minor units are rounded to the nearest integer,
//! with midpoints rounded away from zero (`19.995 USD -> 2000`). The maths is
//! done on `Decimal`, so `49.99` is always exactly `4999` cents.

use crate::error::{MarketError, MarketResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the lowercase ISO 4217 code used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, the others have 2)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert a decimal price to the smallest currency unit.
    ///
    /// Negative prices and amounts that do not fit in an `i64` are rejected.
    pub fn to_minor_units(&self, amount: Decimal) -> MarketResult<i64> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MarketError::InvalidPrice {
                message: format!("price must be non-negative, got {}", amount),
            });
        }

        let multiplier = Decimal::from(10_i64.pow(self.decimal_places()));
        amount
            .checked_mul(multiplier)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|rounded| rounded.to_i64())
            .ok_or_else(|| MarketError::InvalidPrice {
                message: format!("price {} is out of range", amount),
            })
    }

    /// Convert from smallest unit back to a decimal amount
    pub fn from_minor_units(&self, amount: i64) -> Decimal {
        Decimal::new(amount, self.decimal_places())
    }

    /// Format an amount in minor units for display (e.g., "$49.99")
    pub fn format_minor(&self, amount: i64) -> String {
        let symbol = match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF ",
            Currency::MXN => "MX$",
        };
        let decimal = self.from_minor_units(amount);
        format!("{}{:.*}", symbol, self.decimal_places() as usize, decimal)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Currency {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "jpy" => Ok(Currency::JPY),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            "chf" => Ok(Currency::CHF),
            "mxn" => Ok(Currency::MXN),
            other => Err(MarketError::Configuration(format!(
                "unsupported currency: {}",
                other
            ))),
        }
    }
}
