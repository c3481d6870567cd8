//! Loosely typed numeric fields
//!
//! Indexer sources encode the same number as a JSON number, a decimal string
//! or a `0x` hex string (ledger field elements). `Numeric` accepts all three.
//! Anything else (negative, fractional, boolean, object) is kept as
//! `Other` so the owning record, not the whole response, is rejected.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A number as it appears in an indexer record
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Numeric {
    Int(u64),
    Text(String),
    /// Not decodable as an unsigned integer
    Other(Value),
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => match n.as_u64() {
                Some(v) => Numeric::Int(v),
                // JSON integers beyond u64 arrive as floats and are not exact
                None => Numeric::Other(Value::Number(n)),
            },
            Value::String(s) => Numeric::Text(s),
            other => Numeric::Other(other),
        })
    }
}

impl Numeric {
    /// Decode as u128; `None` for malformed input
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Numeric::Int(v) => Some(*v as u128),
            Numeric::Text(s) => parse_u128(s),
            Numeric::Other(_) => None,
        }
    }

    /// Decode as u64; `None` for malformed or oversized input
    pub fn as_u64(&self) -> Option<u64> {
        self.as_u128().and_then(|v| u64::try_from(v).ok())
    }
}

impl std::fmt::Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Numeric::Int(v) => write!(f, "{}", v),
            Numeric::Text(s) => write!(f, "{}", s),
            Numeric::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for Numeric {
    fn from(v: u64) -> Self {
        Numeric::Int(v)
    }
}

/// Parse a decimal or `0x` hex string
pub fn parse_u128(raw: &str) -> Option<u128> {
    let s = raw.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let hex = hex.trim_start_matches('0');
        if hex.is_empty() {
            return Some(0);
        }
        u128::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u128>().ok()
    }
}

/// Serde adapter writing u128 amounts as decimal strings
///
/// Keeps amounts exact through JSON consumers that read numbers as doubles.
pub mod amount {
    use super::Numeric;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = Numeric::deserialize(deserializer)?;
        raw.as_u128()
            .ok_or_else(|| D::Error::custom(format!("invalid amount: {:?}", raw)))
    }
}
