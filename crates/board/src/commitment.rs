//! Board commitments
//!
//! A commitment binds a player to a fleet without revealing it. The digest is
//! computed once, when the board is committed, and must be reproducible from
//! the retained fleet and salt for the life of the game.

use crate::{error::BoardError, fleet::Fleet};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain tag mixed into every board digest
const BOARD_DOMAIN: &[u8] = b"salvo/board-commitment/v1";

/// Random blinding value kept next to the fleet
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Draw a fresh salt from the thread RNG
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt(..)")
    }
}

/// 32-byte commitment digest, hex encoded on the wire
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Parse a `0x`-prefixed or bare hex string
    pub fn from_hex(raw: &str) -> Result<Self, BoardError> {
        let digits = raw
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        if digits.len() > 64 || digits.is_empty() {
            return Err(BoardError::InvalidCommitment);
        }
        // Left-pad so values with stripped leading zeros still parse
        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        for (i, chunk) in padded.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| BoardError::InvalidCommitment)?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| BoardError::InvalidCommitment)?;
        }
        Ok(Self(bytes))
    }

    /// Lowercase `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(66);
        out.push_str("0x");
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", &self.to_hex()[..10])
    }
}

impl From<Commitment> for String {
    fn from(c: Commitment) -> Self {
        c.to_hex()
    }
}

impl TryFrom<String> for Commitment {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Commitment::from_hex(&value)
    }
}

/// Digest policy for board commitments
///
/// Implementations must be deterministic for a given (fleet, salt) pair.
pub trait CommitmentScheme: Send + Sync {
    fn commit(&self, fleet: &Fleet, salt: &Salt) -> Commitment;
}

/// Default scheme: blake3 over the sorted occupied cell indices
/// (u32 little-endian count, then one byte per cell) followed by the salt
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Commitment;

impl CommitmentScheme for Blake3Commitment {
    fn commit(&self, fleet: &Fleet, salt: &Salt) -> Commitment {
        let mut cells: Vec<u8> = fleet.occupied().map(|c| c.index() as u8).collect();
        cells.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        hasher.update(BOARD_DOMAIN);
        hasher.update(&(cells.len() as u32).to_le_bytes());
        hasher.update(&cells);
        hasher.update(&salt.0);
        Commitment(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetGenerator;
    use rand::{rngs::StdRng, SeedableRng};

    fn fleet(seed: u64) -> Fleet {
        FleetGenerator::new()
            .generate(&mut StdRng::seed_from_u64(seed))
            .unwrap()
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let salt = Salt([7u8; 32]);
        let a = Blake3Commitment.commit(&fleet(1), &salt);
        let b = Blake3Commitment.commit(&fleet(1), &salt);
        assert_eq!(a, b);
    }

    #[test]
    fn test_commitment_binds_salt_and_fleet() {
        let salt = Salt([7u8; 32]);
        let base = Blake3Commitment.commit(&fleet(1), &salt);
        assert_ne!(base, Blake3Commitment.commit(&fleet(1), &Salt([8u8; 32])));
        assert_ne!(base, Blake3Commitment.commit(&fleet(2), &salt));
    }

    #[test]
    fn test_hex_parsing_tolerates_stripped_padding() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0xab;
        let c = Commitment(bytes);
        assert_eq!(Commitment::from_hex("0xAB").unwrap(), c);
        assert_eq!(Commitment::from_hex(&c.to_hex()).unwrap(), c);
        assert!(Commitment::from_hex("0xzz").is_err());
        assert!(Commitment::from_hex("").is_err());
    }

    #[test]
    fn test_serde_uses_hex() {
        let c = Commitment([1u8; 32]);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.starts_with("\"0x0101"));
        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
