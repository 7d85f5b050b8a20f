//! # Currency Data Model
//!
//! Value types shared by the bot, the stores and the HTTP services.
//!
//! - **CurrencyCode**: three latin letters, always upper-case once parsed
//! - **PositiveDecimal**: a rate or an amount, strictly greater than zero
//! - **Currency**: a stored `(code, rate)` pair, rate quoted in rubles
//! - **Conversion**: the result of `amount × rate`
//!
//! ```rust
//! use currency_bot::currency_model::{CurrencyCode, PositiveDecimal};
//!
//! let code = CurrencyCode::parse(" usd ").unwrap();
//! assert_eq!(code.as_str(), "USD");
//!
//! let rate = PositiveDecimal::parse("89,50").unwrap();
//! assert_eq!(rate.to_string(), "89.50");
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::errors::InputError;

/// Quote unit every rate is expressed in
pub const QUOTE_CURRENCY: &str = "RUB";

static CURRENCY_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3}$").expect("Invalid currency code regex"));

/// A validated, upper-cased ISO-style currency code
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Trim, check against `^[A-Za-z]{3}$` and upper-case
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let trimmed = input.trim();
        if !CURRENCY_CODE_REGEX.is_match(trimmed) {
            return Err(InputError::InvalidCurrencyCode);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A decimal strictly greater than zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PositiveDecimal(Decimal);

impl PositiveDecimal {
    pub fn new(value: Decimal) -> Result<Self, InputError> {
        if value <= Decimal::ZERO {
            return Err(InputError::NotPositive);
        }
        Ok(Self(value))
    }

    /// Parse user input; `,` is accepted as the decimal separator and
    /// scientific notation (`1e3`) is accepted as well
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let normalized = input.trim().replace(',', ".");
        let value = Decimal::from_str(&normalized)
            .or_else(|_| Decimal::from_scientific(&normalized))
            .map_err(|_| InputError::InvalidNumber)?;
        Self::new(value)
    }

    pub fn one() -> Self {
        Self(Decimal::ONE)
    }

    pub fn get(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for PositiveDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A stored currency and its rate to the quote unit
#[derive(Debug, Clone, PartialEq)]
pub struct Currency {
    pub code: CurrencyCode,
    pub rate: Decimal,
}

/// Result of converting an amount of a currency into the quote unit
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub code: CurrencyCode,
    pub amount: Decimal,
    pub rate: Decimal,
    pub converted_amount: Decimal,
}

impl Conversion {
    /// `amount × rate`, exact in decimal arithmetic
    pub fn compute(
        code: CurrencyCode,
        amount: PositiveDecimal,
        rate: Decimal,
    ) -> Result<Self, InputError> {
        let converted_amount = amount
            .get()
            .checked_mul(rate)
            .ok_or(InputError::TooLarge)?;
        Ok(Self {
            code,
            amount: amount.get(),
            rate,
            converted_amount,
        })
    }
}
