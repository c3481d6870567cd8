//! Canonical account addresses
//!
//! Indexer sources pad the same address differently (`0x00ab..` vs `0xab..`)
//! and mix letter case. An `Address` is always stored canonicalized: lowercase
//! hex, `0x` prefix, no leading zeros. Equality on `Address` is therefore
//! equality of the logical account.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Address parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Empty address")]
    Empty,

    #[error("Address is not hex: {0}")]
    NotHex(String),

    #[error("Address longer than 252 bits: {0}")]
    TooLong(String),
}

/// A canonicalized ledger address
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct Address(String);

impl Address {
    /// Parse and canonicalize a raw address literal
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex(raw.to_string()));
        }

        let significant = digits.trim_start_matches('0').to_ascii_lowercase();
        if significant.len() > 63 {
            return Err(AddressError::TooLong(raw.to_string()));
        }

        if significant.is_empty() {
            Ok(Self("0x0".to_string()))
        } else {
            Ok(Self(format!("0x{}", significant)))
        }
    }

    /// The zero address, used by the ledger for "unset"
    pub fn zero() -> Self {
        Self("0x0".to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0x0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        if self.0.len() <= 10 {
            self.0.clone()
        } else {
            format!("{}..{}", &self.0[..6], &self.0[self.0.len() - 4..])
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}
