//! Per-game local secrets
//!
//! The fleet placement, the board salt and the coin secret never leave this
//! machine except through a reveal or a proof. They are written to the local
//! store before anything derived from them is submitted.

use crate::coin::CoinSecret;
use chain_types::GameId;
use rand::Rng;
use salvo_board::{BoardError, Commitment, CommitmentScheme, Fleet, FleetGenerator, Salt};
use salvo_runtime::LocalStore;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LocalSecrets {
    /// Original placement; shot answers always read this, never a view
    pub fleet: Fleet,
    pub board_salt: Salt,
    pub coin: CoinSecret,
}

impl LocalSecrets {
    /// Fresh fleet, salt and coin secret
    pub fn generate<R: Rng>(generator: &FleetGenerator, rng: &mut R) -> Result<Self, BoardError> {
        let fleet = generator.generate(rng)?;
        Ok(Self {
            fleet,
            board_salt: Salt(rng.gen()),
            coin: CoinSecret::generate(rng),
        })
    }

    pub fn board_commitment(&self, scheme: &dyn CommitmentScheme) -> Commitment {
        scheme.commit(&self.fleet, &self.board_salt)
    }

    /// Load the secrets for `game`, generating and persisting new ones if absent
    ///
    /// A stored placement that fails validation is an error (raised while
    /// decoding), not a reason to silently generate a different board.
    pub fn load_or_generate<R: Rng>(
        store: &LocalStore,
        game: GameId,
        generator: &FleetGenerator,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        if let Some(secrets) = store.load_secrets::<LocalSecrets>(game)? {
            tracing::info!("Restored local secrets for {}", game);
            return Ok(secrets);
        }

        let secrets = Self::generate(generator, rng)?;
        store.save_secrets(game, &secrets)?;
        tracing::info!("Generated and stored local secrets for {}", game);
        Ok(secrets)
    }
}
