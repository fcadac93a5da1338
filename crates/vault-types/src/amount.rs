
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VaultError};

/// Fixed-point amount with 9 decimal places
/// Internally stored as i128 to prevent overflow
///
/// Serialized as a decimal string (`"1000.25"`) so that JSON consumers never
/// see the scaled representation. Deserializes from a decimal string (exact)
/// or a plain number (via f64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct Amount(i128);

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(f64),
}

const SCALE: i128 = 1_000_000_000; // 10^9
const DECIMALS: usize = 9;

impl Amount {
    /// Zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create from raw i128 (scaled value)
    pub const fn from_raw(raw: i128) -> Self {
        Amount(raw)
    }

    /// Get the raw scaled value
    pub const fn raw(&self) -> i128 {
        self.0
    }

    /// Create from integer units
    pub const fn from_units(units: i64) -> Self {
        Amount((units as i128) * SCALE)
    }

    /// Create from f64, rounding to the nearest representable value.
    /// NaN, infinities and negative values too small to represent are
    /// rejected. Positive values below resolution round to zero.
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(VaultError::InvalidAmount(format!(
                "non-finite value: {}",
                value
            )));
        }
        let scaled = (value * (SCALE as f64)).round();
        // A negative input must stay negative, even below resolution
        if value < 0.0 && scaled == 0.0 {
            return Err(VaultError::InvalidAmount(format!(
                "negative value below resolution: {}",
                value
            )));
        }
        if scaled.abs() >= (i128::MAX as f64) {
            return Err(VaultError::Overflow(format!("out of range: {}", value)));
        }
        Ok(Amount(scaled as i128))
    }

    /// Convert to f64 (lossy)
    pub fn to_f64(&self) -> f64 {
        (self.0 as f64) / (SCALE as f64)
    }

    /// Parse an exact decimal string such as `"123.456789"` or `"-5"`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || VaultError::InvalidAmount(format!("cannot parse: {:?}", s));

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(invalid());
        }
        if frac.len() > DECIMALS {
            return Err(VaultError::InvalidAmount(format!(
                "more than {} decimal places: {}",
                DECIMALS, s
            )));
        }

        let out_of_range = || VaultError::Overflow(format!("out of range: {}", s));
        let whole_raw = if whole.is_empty() {
            0
        } else {
            whole.parse::<i128>().map_err(|_| out_of_range())?
        };
        let frac_raw = if frac.is_empty() {
            0
        } else {
            let padding = 10i128.pow((DECIMALS - frac.len()) as u32);
            frac.parse::<i128>().map_err(|_| invalid())? * padding
        };

        let raw = whole_raw
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_raw))
            .ok_or_else(out_of_range)?;

        Ok(Amount(if negative { -raw } else { raw }))
    }

    /// Check if amount is negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Check if amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| VaultError::Overflow(format!("{} + {}", self, other)))
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| VaultError::Overflow(format!("{} - {}", self, other)))
    }

    /// Saturating addition, for running totals that must never fail
    pub const fn saturating_add(&self, other: Self) -> Self {
        Amount(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u128;
        let frac = abs % SCALE as u128;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac = format!("{:09}", frac);
            write!(f, "{}{}.{}", sign, whole, frac.trim_end_matches('0'))
        }
    }
}

impl FromStr for Amount {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Amount::parse(s)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Text(s) => Amount::parse(&s),
            AmountRepr::Number(value) => Amount::from_f64(value),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
