//! Exact token amounts in base units.
//!
//! Balances and transfer amounts travel on the wire as decimal strings
//! denominated in base units (display value scaled by a fixed number of
//! decimals). Scaled to 18 decimals they exceed f64's safe-integer range,
//! so every conversion here runs through `rust_decimal` and fails loudly
//! instead of rounding.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors converting to or from token amounts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AmountError {
    #[error("invalid decimal amount '{0}'")]
    Invalid(String),

    #[error("negative amount '{0}'")]
    Negative(String),

    #[error("scaling '{value}' by 10^{decimals} would lose precision")]
    PrecisionLoss { value: String, decimals: u32 },

    #[error("unsupported decimal scale {0} (max 28)")]
    Scale(u32),

    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// A non-negative token amount in base units.
///
/// Serializes as a plain decimal string (`"1000000000000000000"`), matching
/// the backend's `balance`/`amount` wire fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(Decimal);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: TokenAmount = TokenAmount(Decimal::ZERO);

    /// Parses a base-unit decimal string exactly. Rejects negative values
    /// and anything `rust_decimal` cannot represent without rounding.
    pub fn from_base_units(value: &str) -> Result<Self, AmountError> {
        let parsed = Decimal::from_str_exact(value.trim())
            .map_err(|_| AmountError::Invalid(value.to_string()))?;
        if parsed.is_sign_negative() {
            return Err(AmountError::Negative(value.to_string()));
        }
        Ok(Self(parsed.normalize()))
    }

    /// Converts a display amount (e.g. `"1.5"`) to base units by scaling
    /// with `10^decimals`. The transform is exact: any fractional residue
    /// after scaling is an error, never a rounded result.
    pub fn from_display(value: &str, decimals: u32) -> Result<Self, AmountError> {
        let parsed = Decimal::from_str_exact(value.trim())
            .map_err(|_| AmountError::Invalid(value.to_string()))?;
        if parsed.is_sign_negative() {
            return Err(AmountError::Negative(value.to_string()));
        }
        let scaled = parsed
            .checked_mul(scale_factor(decimals)?)
            .ok_or(AmountError::Overflow)?
            .normalize();
        if scaled.scale() != 0 {
            return Err(AmountError::PrecisionLoss {
                value: value.to_string(),
                decimals,
            });
        }
        Ok(Self(scaled))
    }

    /// Whole-unit constructor used by scenario definitions (`units(1, 18)`
    /// is one token at 18 decimals).
    pub fn units(count: u64, decimals: u32) -> Result<Self, AmountError> {
        let scaled = Decimal::from(count)
            .checked_mul(scale_factor(decimals)?)
            .ok_or(AmountError::Overflow)?;
        Ok(Self(scaled.normalize()))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(&self, other: &TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(|d| TokenAmount(d.normalize()))
    }

    /// Checked subtraction; `None` when the result would go negative.
    /// Balances are non-negative by invariant, so a negative delta is a
    /// signal, not a value.
    pub fn checked_sub(&self, other: &TokenAmount) -> Option<TokenAmount> {
        let diff = self.0.checked_sub(other.0)?;
        if diff.is_sign_negative() {
            None
        } else {
            Some(TokenAmount(diff.normalize()))
        }
    }

    /// Absolute difference between two amounts, for tolerance checks.
    pub fn abs_diff(&self, other: &TokenAmount) -> TokenAmount {
        if self.0 >= other.0 {
            TokenAmount((self.0 - other.0).normalize())
        } else {
            TokenAmount((other.0 - self.0).normalize())
        }
    }

    /// Renders the amount as a base-unit decimal string.
    pub fn to_base_units(&self) -> String {
        self.0.normalize().to_string()
    }
}

fn scale_factor(decimals: u32) -> Result<Decimal, AmountError> {
    if decimals > 28 {
        return Err(AmountError::Scale(decimals));
    }
    Ok(Decimal::from_i128_with_scale(10i128.pow(decimals), 0))
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base_units())
    }
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenAmount::from_base_units(s)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base_units())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TokenAmount::from_base_units(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_units_exactly() {
        let amount = TokenAmount::from_base_units("1000000000000000000").unwrap();
        assert_eq!(amount.to_base_units(), "1000000000000000000");
        assert_eq!(TokenAmount::from_base_units("0").unwrap(), TokenAmount::ZERO);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(matches!(
            TokenAmount::from_base_units("-5"),
            Err(AmountError::Negative(_))
        ));
        assert!(matches!(
            TokenAmount::from_base_units("1e5"),
            Err(AmountError::Invalid(_))
        ));
        assert!(matches!(
            TokenAmount::from_base_units("abc"),
            Err(AmountError::Invalid(_))
        ));
    }

    #[test]
    fn display_to_base_is_exact() {
        let one = TokenAmount::from_display("1", 18).unwrap();
        assert_eq!(one.to_base_units(), "1000000000000000000");

        let fractional = TokenAmount::from_display("1.5", 18).unwrap();
        assert_eq!(fractional.to_base_units(), "1500000000000000000");

        // 19 fractional digits cannot scale into 18 decimals without loss.
        assert!(matches!(
            TokenAmount::from_display("0.0000000000000000001", 18),
            Err(AmountError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn large_balances_beyond_f64_safe_integers() {
        // 12345678.901234567890123456 tokens at 18 decimals: 26 significant
        // digits, far past f64's 2^53 safe range.
        let amount = TokenAmount::from_display("12345678.901234567890123456", 18).unwrap();
        assert_eq!(amount.to_base_units(), "12345678901234567890123456");
    }

    #[test]
    fn checked_sub_signals_negative_delta() {
        let one = TokenAmount::units(1, 18).unwrap();
        let two = TokenAmount::units(2, 18).unwrap();
        assert_eq!(two.checked_sub(&one), Some(one));
        assert_eq!(one.checked_sub(&two), None);
        assert_eq!(one.abs_diff(&two), one);
    }

    #[test]
    fn serde_round_trips_as_string() {
        let amount = TokenAmount::from_base_units("1500000000000000000").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1500000000000000000\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
