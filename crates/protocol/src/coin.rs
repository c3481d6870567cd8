//! Coin-flip secret
//!
//! Each player commits to `blake3(value_le || salt)` and later reveals
//! `(value, salt)`. The parity of the XOR of both values picks the first
//! attacker.

use rand::Rng;
use salvo_board::{Commitment, Salt};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CoinSecret {
    pub value: u64,
    pub salt: Salt,
}

impl CoinSecret {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self {
            value: rng.gen(),
            salt: Salt(rng.gen()),
        }
    }

    pub fn commitment(&self) -> Commitment {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.value.to_le_bytes());
        hasher.update(&self.salt.0);
        Commitment(*hasher.finalize().as_bytes())
    }

    /// Whether `(value, salt)` opens `commitment`
    pub fn opens(&self, commitment: &Commitment) -> bool {
        self.commitment() == *commitment
    }
}
