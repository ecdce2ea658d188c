//! Validated ledger addresses.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Address format required of every provisioned identity: `0x` followed by
/// exactly 40 hex digits.
pub const ADDRESS_PATTERN: &str = "^0x[0-9a-fA-F]{40}$";

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ADDRESS_PATTERN).expect("static pattern compiles"))
}

/// Error parsing an address.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed address '{0}' (expected 0x + 40 hex digits)")]
pub struct AddressError(pub String);

/// A fixed-width hex ledger address.
///
/// The original casing is preserved for display (the backend checksums the
/// hex), but equality and hashing are case-insensitive: the same account may
/// come back checksummed from one endpoint and lowercased from another.
#[derive(Debug, Clone)]
pub struct Address(String);

impl Address {
    /// Parses and validates an address string.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if address_regex().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(AddressError(raw.to_string()))
        }
    }

    /// Returns true without constructing, for format assertions on raw
    /// observed strings.
    pub fn is_well_formed(raw: &str) -> bool {
        address_regex().is_match(raw.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_addresses() {
        let addr = Address::parse("0x5068a014aC8e691Be53848FE5872cbA9f8C4dA17").unwrap();
        assert_eq!(addr.as_str(), "0x5068a014aC8e691Be53848FE5872cbA9f8C4dA17");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Address::parse("0xinvalid").is_err());
        assert!(Address::parse("5068a014aC8e691Be53848FE5872cbA9f8C4dA17").is_err());
        assert!(Address::parse("0x5068a014aC8e691Be53848FE5872cbA9f8C4dA1").is_err());
        assert!(Address::parse("0x5068a014aC8e691Be53848FE5872cbA9f8C4dA17ff").is_err());
        assert!(!Address::is_well_formed("0xzz68a014aC8e691Be53848FE5872cbA9f8C4dA17"));
    }

    #[test]
    fn equality_ignores_case() {
        let checksummed = Address::parse("0x5068a014aC8e691Be53848FE5872cbA9f8C4dA17").unwrap();
        let lowered = Address::parse("0x5068a014ac8e691be53848fe5872cba9f8c4da17").unwrap();
        assert_eq!(checksummed, lowered);
    }
}
