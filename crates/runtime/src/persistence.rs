//! Local persistence
//!
//! Uses a sled database to keep what must survive a restart: the active game
//! id and, per game, the local secrets (fleet placement, board salt, coin
//! secret). Board views and snapshots are never persisted; they are rebuilt
//! from the placement and a fresh poll.

use chain_types::GameId;
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::path::Path;

const ACTIVE_GAME_KEY: &str = "active_game";

/// Persistent store for session keys and per-game secrets
pub struct LocalStore {
    /// Sled database instance
    db: Db,
    /// Session keys (active game)
    session: sled::Tree,
    /// Per-game secrets, keyed by big-endian game id
    secrets: sled::Tree,
}

impl LocalStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let session = db.open_tree("session")?;
        let secrets = db.open_tree("secrets")?;

        tracing::info!("Opened local store at {:?}", path.as_ref());

        Ok(Self { db, session, secrets })
    }

    /// Record the active game
    pub fn set_active_game(&self, game: GameId) -> anyhow::Result<()> {
        self.session.insert(ACTIVE_GAME_KEY, game.0.to_be_bytes().to_vec())?;
        self.flush()
    }

    /// The game active at last shutdown
    pub fn active_game(&self) -> anyhow::Result<Option<GameId>> {
        match self.session.get(ACTIVE_GAME_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("Invalid active game record"))?;
                Ok(Some(GameId(u64::from_be_bytes(arr))))
            }
            None => Ok(None),
        }
    }

    pub fn clear_active_game(&self) -> anyhow::Result<()> {
        self.session.remove(ACTIVE_GAME_KEY)?;
        self.flush()
    }

    /// Store the secrets for a game; flushed before returning
    pub fn save_secrets<T: Serialize>(&self, game: GameId, secrets: &T) -> anyhow::Result<()> {
        let bytes = bincode::serialize(secrets)?;
        self.secrets.insert(game.0.to_be_bytes(), bytes)?;
        self.flush()
    }

    /// Load the secrets for a game
    pub fn load_secrets<T: DeserializeOwned>(&self, game: GameId) -> anyhow::Result<Option<T>> {
        match self.secrets.get(game.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove_secrets(&self, game: GameId) -> anyhow::Result<()> {
        self.secrets.remove(game.0.to_be_bytes())?;
        Ok(())
    }

    /// Games with stored secrets
    pub fn games(&self) -> anyhow::Result<Vec<GameId>> {
        let mut games = Vec::new();
        for key in self.secrets.iter().keys() {
            let key = key?;
            let arr: [u8; 8] = key
                .as_ref()
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid game key length"))?;
            games.push(GameId(u64::from_be_bytes(arr)));
        }
        Ok(games)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
