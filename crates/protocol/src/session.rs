//! Session context
//!
//! Owns everything bound to the active game: the reconciler, its sync tasks
//! and the protocol machine. Switching games stops the old tasks before the
//! new ones start, so facts for one game never reach another's reconciler.

use crate::{
    error::ProtocolError,
    machine::ProtocolMachine,
    prover::{SelfReportProver, ShotProver},
    secrets::LocalSecrets,
};
use chain_types::{Address, GameAction, GameId};
use ledger_submission::{Execution, SubmissionController};
use salvo_board::{Blake3Commitment, CommitmentScheme, FleetGenerator};
use salvo_runtime::{poll_all, GameTasks, Indexer, LocalStore, Reconciler, RuntimeConfig};
use std::sync::Arc;

struct ActiveGame {
    reconciler: Arc<Reconciler>,
    tasks: GameTasks,
    machine: Arc<ProtocolMachine>,
}

/// The local player's session across games
pub struct Session {
    me: Address,
    indexer: Arc<dyn Indexer>,
    controller: Arc<SubmissionController>,
    store: Arc<LocalStore>,
    config: RuntimeConfig,
    prover: Arc<dyn ShotProver>,
    scheme: Arc<dyn CommitmentScheme>,
    generator: FleetGenerator,
    active: Option<ActiveGame>,
}

impl Session {
    pub fn new(
        me: Address,
        indexer: Arc<dyn Indexer>,
        controller: Arc<SubmissionController>,
        store: Arc<LocalStore>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            me,
            indexer,
            controller,
            store,
            config,
            prover: Arc::new(SelfReportProver),
            scheme: Arc::new(Blake3Commitment),
            generator: FleetGenerator::new(),
            active: None,
        }
    }

    pub fn with_prover(mut self, prover: Arc<dyn ShotProver>) -> Self {
        self.prover = prover;
        self
    }

    pub fn with_commitment_scheme(mut self, scheme: Arc<dyn CommitmentScheme>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_fleet_generator(mut self, generator: FleetGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn me(&self) -> &Address {
        &self.me
    }

    pub fn active_game(&self) -> Option<GameId> {
        self.active.as_ref().map(|a| a.reconciler.game_id())
    }

    pub fn machine(&self) -> Option<Arc<ProtocolMachine>> {
        self.active.as_ref().map(|a| a.machine.clone())
    }

    /// Force an out-of-band poll of every stream
    pub fn refresh(&self) {
        if let Some(active) = &self.active {
            active.tasks.refresh();
        }
    }

    /// Open a new game on the ledger
    ///
    /// The game id is assigned remotely; switch to it once the indexer
    /// reports it.
    pub async fn create_game(&self, stake: u128) -> Result<Execution, ProtocolError> {
        let execution = self.controller.execute(&self.me, GameAction::Create { stake }).await?;
        tracing::info!(
            "Create (stake {}) finished as {:?} in tx {}",
            stake,
            execution.outcome,
            execution.submitted.handle.hash
        );
        Ok(execution)
    }

    /// Make `game` the active game
    ///
    /// Secrets are loaded (or generated and persisted) before any task starts;
    /// the board views are rebuilt from the placement and a fresh poll.
    pub async fn switch_game(&mut self, game: GameId) -> Result<Arc<ProtocolMachine>, ProtocolError> {
        if let Some(active) = &self.active {
            if active.reconciler.game_id() == game {
                return Ok(active.machine.clone());
            }
        }
        self.close().await;

        let secrets = LocalSecrets::load_or_generate(&self.store, game, &self.generator, &mut rand::thread_rng())?;

        let reconciler = Arc::new(Reconciler::new(game, self.me.clone()));
        reconciler.attach_fleet(secrets.fleet.clone());
        poll_all(self.indexer.as_ref(), &reconciler).await;

        self.store.set_active_game(game)?;
        let tasks = GameTasks::spawn(self.indexer.clone(), reconciler.clone(), self.config.clone());

        let machine = Arc::new(
            ProtocolMachine::new(self.me.clone(), reconciler.reader(), self.controller.clone(), secrets)
                .with_prover(self.prover.clone())
                .with_commitment_scheme(self.scheme.clone()),
        );
        tracing::info!("Active game is now {} for {}", game, self.me.short());

        self.active = Some(ActiveGame {
            reconciler,
            tasks,
            machine: machine.clone(),
        });
        Ok(machine)
    }

    /// Resume the game that was active at last shutdown, if any
    pub async fn restore(&mut self) -> Result<Option<Arc<ProtocolMachine>>, ProtocolError> {
        match self.store.active_game()? {
            Some(game) => {
                tracing::info!("Restoring session for {}", game);
                Ok(Some(self.switch_game(game).await?))
            }
            None => Ok(None),
        }
    }

    /// Stop the active game's tasks; the stored active game id is kept
    pub async fn close(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!("Leaving {}", active.reconciler.game_id());
            active.tasks.shutdown().await;
        }
    }

    /// Stop the active game and forget it
    pub async fn leave(&mut self) -> Result<(), ProtocolError> {
        self.close().await;
        self.store.clear_active_game()?;
        Ok(())
    }
}
