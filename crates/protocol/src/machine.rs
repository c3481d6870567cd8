//! Protocol Machine - Local legality and action execution
//!
//! The machine never writes session state. It reads the reconciler's latest
//! snapshot, decides whether an action is legal for the local player, and
//! hands legal actions to the submission controller. The resulting ledger
//! facts come back through the reconciler like any other fact.
//!
//! Request flow:
//! 1. Check legality against the current snapshot (no network on rejection)
//! 2. Claim the single in-flight slot
//! 3. Re-check against the latest snapshot right before submitting
//! 4. Execute and classify; only `Succeeded` marks the action as awaiting
//!    observation

use crate::{
    error::ProtocolError,
    prover::{SelfReportProver, ShotProver},
    secrets::LocalSecrets,
};
use chain_types::{ActionKind, Address, CoinState, GameAction, GameId};
use ledger_submission::{Execution, SubmissionController, Submitted, TxOutcome};
use parking_lot::Mutex;
use salvo_board::{Blake3Commitment, CommitmentScheme, Coordinate, LocalBoardView};
use salvo_runtime::{GameSnapshot, Phase, SessionReader};
use std::sync::Arc;

/// What the local player asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    Join,
    CommitCoin,
    RevealCoin,
    /// Approve then stake the outstanding escrow amount
    Stake,
    CommitBoard,
    Fire(Coordinate),
    /// Answer the shot pending against our board
    Prove,
    Cancel,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Join => ActionKind::Join,
            ActionRequest::CommitCoin => ActionKind::CommitCoin,
            ActionRequest::RevealCoin => ActionKind::RevealCoin,
            ActionRequest::Stake => ActionKind::Stake,
            ActionRequest::CommitBoard => ActionKind::CommitBoard,
            ActionRequest::Fire(_) => ActionKind::Fire,
            ActionRequest::Prove => ActionKind::Prove,
            ActionRequest::Cancel => ActionKind::Cancel,
        }
    }
}

/// Result of [`ProtocolMachine::retry_stalled`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The stalled transaction turned out to be final
    Finalized(TxOutcome),
    /// The snapshot already shows its effect
    Observed,
    /// Replaced with a higher tip
    Resubmitted(Execution),
}

/// A legal request, resolved into what will be submitted
enum Plan {
    Single(GameAction),
    Stake { amount: u128 },
    Prove { coordinate: Coordinate },
}

#[derive(Default)]
struct LocalState {
    in_flight: Option<ActionKind>,
    /// Succeeded on the ledger but not yet visible in a snapshot
    optimistic: Vec<GameAction>,
    /// Timed out; outcome unknown until the receipt or a poll says otherwise
    stalled: Option<Submitted>,
}

/// Clears the in-flight slot however the request ends
struct InFlightGuard<'a> {
    state: &'a Mutex<LocalState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight = None;
    }
}

/// Local protocol state machine for one game
pub struct ProtocolMachine {
    game_id: GameId,
    me: Address,
    reader: SessionReader,
    controller: Arc<SubmissionController>,
    secrets: LocalSecrets,
    prover: Arc<dyn ShotProver>,
    scheme: Arc<dyn CommitmentScheme>,
    state: Mutex<LocalState>,
}

impl ProtocolMachine {
    pub fn new(me: Address, reader: SessionReader, controller: Arc<SubmissionController>, secrets: LocalSecrets) -> Self {
        let game_id = reader.current().snapshot.game_id;
        Self {
            game_id,
            me,
            reader,
            controller,
            secrets,
            prover: Arc::new(SelfReportProver),
            scheme: Arc::new(Blake3Commitment),
            state: Mutex::new(LocalState::default()),
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

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn me(&self) -> &Address {
        &self.me
    }

    /// Fresh read handle, e.g. for waiting on changes
    pub fn reader(&self) -> SessionReader {
        self.reader.clone()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.reader.current_snapshot()
    }

    pub fn board_views(&self) -> LocalBoardView {
        self.reader.current_board_views()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.reader.current().snapshot.phase().cloned()
    }

    pub fn in_flight(&self) -> Option<ActionKind> {
        self.state.lock().in_flight
    }

    pub fn stalled(&self) -> Option<Submitted> {
        self.state.lock().stalled.clone()
    }

    /// Actions the local player may request right now
    ///
    /// Empty while another action is in flight.
    pub fn legal_actions(&self) -> Vec<ActionKind> {
        let state = self.reader.current();
        let snapshot = &state.snapshot;
        let fire = Coordinate::all()
            .find(|c| !snapshot.has_fired_at(&self.me, c))
            .map(ActionRequest::Fire);

        [
            ActionRequest::Join,
            ActionRequest::CommitCoin,
            ActionRequest::RevealCoin,
            ActionRequest::Stake,
            ActionRequest::CommitBoard,
            ActionRequest::Prove,
            ActionRequest::Cancel,
        ]
        .into_iter()
        .chain(fire)
        .filter(|request| self.check(*request, snapshot).is_ok())
        .map(|request| request.kind())
        .collect()
    }

    /// Cells on the opponent's board we have not fired at
    pub fn untried_targets(&self) -> Vec<Coordinate> {
        let snapshot = self.snapshot();
        Coordinate::all()
            .filter(|c| !snapshot.has_fired_at(&self.me, c))
            .collect()
    }

    /// Validate, submit and classify one request
    ///
    /// Illegal requests fail before any network call. An included
    /// transaction is `Ok` whatever its outcome; match on
    /// `Execution::outcome`.
    pub async fn request_action(&self, request: ActionRequest) -> Result<Execution, ProtocolError> {
        let kind = request.kind();
        self.check(request, &self.reader.current().snapshot)?;

        let _guard = self.claim(kind)?;
        tracing::debug!("{}: {} claimed by {}", self.game_id, kind, self.me.short());

        match self.check_rules(request, &self.reader.current().snapshot)? {
            Plan::Single(action) => self.execute(action).await,
            Plan::Stake { amount } => {
                let approval = self
                    .execute(GameAction::Approve {
                        game_id: self.game_id,
                        amount,
                    })
                    .await?;
                if !approval.outcome.is_success() {
                    return Ok(approval);
                }
                self.execute(GameAction::Stake {
                    game_id: self.game_id,
                    amount,
                })
                .await
            }
            Plan::Prove { coordinate } => {
                let proof = self
                    .prover
                    .prove(&self.secrets.fleet, &self.secrets.board_salt, coordinate)
                    .await?;
                // proving takes time; the shot must still be open
                self.check_rules(request, &self.reader.current().snapshot)?;
                self.execute(GameAction::Prove {
                    game_id: self.game_id,
                    coordinate,
                    outcome: proof.outcome,
                    proof: proof.proof,
                })
                .await
            }
        }
    }

    /// Re-examine a timed-out submission and replace it if still not final
    pub async fn retry_stalled(&self, tip_bump: f64) -> Result<RetryOutcome, ProtocolError> {
        let stalled = self.state.lock().stalled.clone().ok_or(ProtocolError::NothingStalled)?;
        let kind = stalled.action.kind();

        if let Some(outcome) = self.controller.check_receipt(&stalled.handle).await? {
            tracing::info!("{}: stalled {} finalized as {:?}", self.game_id, kind, outcome);
            let mut state = self.state.lock();
            state.stalled = None;
            if outcome.is_success() && kind != ActionKind::Approve {
                state.optimistic.push(stalled.action.clone());
            }
            return Ok(RetryOutcome::Finalized(outcome));
        }

        if effect_observed(&stalled.action, &self.reader.current().snapshot, &self.me) {
            tracing::info!("{}: stalled {} already observed on the ledger", self.game_id, kind);
            self.state.lock().stalled = None;
            return Ok(RetryOutcome::Observed);
        }

        let _guard = self.claim(kind)?;
        let replacement = self.controller.resubmit_with_higher_tip(&stalled, tip_bump).await?;
        let outcome = self.controller.await_outcome(&replacement).await;
        let execution = Execution {
            submitted: replacement,
            outcome,
        };
        self.record(&execution);
        Ok(RetryOutcome::Resubmitted(execution))
    }

    fn claim(&self, kind: ActionKind) -> Result<InFlightGuard<'_>, ProtocolError> {
        let mut state = self.state.lock();
        if let Some(busy) = state.in_flight {
            return Err(ProtocolError::InFlight(busy));
        }
        state.in_flight = Some(kind);
        Ok(InFlightGuard { state: &self.state })
    }

    async fn execute(&self, action: GameAction) -> Result<Execution, ProtocolError> {
        let execution = self.controller.execute(&self.me, action).await?;
        self.record(&execution);
        Ok(execution)
    }

    fn record(&self, execution: &Execution) {
        let kind = execution.submitted.action.kind();
        let mut state = self.state.lock();
        match &execution.outcome {
            TxOutcome::Succeeded => {
                tracing::info!("{}: {} succeeded, awaiting indexer", self.game_id, kind);
                // an approval alone has no observable effect
                if kind != ActionKind::Approve {
                    state.optimistic.push(execution.submitted.action.clone());
                }
                state.stalled = None;
            }
            TxOutcome::Reverted { codes, .. } => {
                tracing::warn!("{}: {} reverted {:?}, re-enabling", self.game_id, kind, codes);
                state.stalled = None;
            }
            TxOutcome::TimedOut => {
                tracing::warn!(
                    "{}: {} outcome unknown (tx {}), check later",
                    self.game_id,
                    kind,
                    execution.submitted.handle.hash
                );
                state.stalled = Some(execution.submitted.clone());
            }
        }
    }

    // ============ Legality ============

    fn check(&self, request: ActionRequest, snapshot: &GameSnapshot) -> Result<Plan, ProtocolError> {
        self.check_local_flags(request.kind(), snapshot)?;
        self.check_rules(request, snapshot)
    }

    /// Phase and role rules only, without the local flags
    fn check_rules(&self, request: ActionRequest, snapshot: &GameSnapshot) -> Result<Plan, ProtocolError> {
        let kind = request.kind();
        let Some(session) = &snapshot.session else {
            return Err(illegal(kind, "UNOBSERVED"));
        };
        let phase = &session.phase;

        if request != ActionRequest::Join && !session.is_participant(&self.me) {
            return Err(ProtocolError::NotParticipant(self.me.clone()));
        }

        let blocking = snapshot.blocking_anomalies(kind);
        if !blocking.is_empty() {
            let reason = blocking.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("; ");
            return Err(ProtocolError::Disabled { action: kind, reason });
        }

        let game_id = self.game_id;
        match request {
            ActionRequest::Join => {
                if *phase != Phase::AwaitingOpponent || session.player_a == self.me {
                    return Err(illegal(kind, phase));
                }
                Ok(Plan::Single(GameAction::Join { game_id }))
            }
            ActionRequest::Cancel => {
                if !phase.is_pre_active() {
                    return Err(illegal(kind, phase));
                }
                Ok(Plan::Single(GameAction::Cancel { game_id }))
            }
            ActionRequest::CommitCoin => {
                if *phase != Phase::CoinFlipPending || snapshot.coin_state(&self.me).is_some() {
                    return Err(illegal(kind, phase));
                }
                Ok(Plan::Single(GameAction::CommitCoin {
                    game_id,
                    commitment: self.secrets.coin.commitment(),
                }))
            }
            ActionRequest::RevealCoin => {
                let opponent_committed = session
                    .opponent_of(&self.me)
                    .is_some_and(|o| snapshot.coin_state(o).is_some());
                if *phase != Phase::CoinFlipPending
                    || snapshot.coin_state(&self.me) != Some(CoinState::Committed)
                    || !opponent_committed
                {
                    return Err(illegal(kind, phase));
                }
                Ok(Plan::Single(GameAction::RevealCoin {
                    game_id,
                    value: self.secrets.coin.value,
                    salt: self.secrets.coin.salt,
                }))
            }
            ActionRequest::Stake => {
                let staking_phase = matches!(phase, Phase::CoinFlipPending | Phase::BoardCommitPending);
                if !staking_phase || !snapshot.escrow.must_stake(&self.me) {
                    return Err(illegal(kind, phase));
                }
                let amount = snapshot
                    .escrow
                    .required
                    .saturating_sub(snapshot.escrow.stake_of(&self.me));
                Ok(Plan::Stake { amount })
            }
            ActionRequest::CommitBoard => {
                if *phase != Phase::BoardCommitPending || snapshot.has_committed(&self.me) {
                    return Err(illegal(kind, phase));
                }
                // no commitment before both sides carry the same exposure
                for player in session.players() {
                    if snapshot.escrow.must_stake(player) {
                        return Err(ProtocolError::StakeNotMatched {
                            player: player.clone(),
                            required: snapshot.escrow.required,
                        });
                    }
                }
                Ok(Plan::Single(GameAction::CommitBoard {
                    game_id,
                    commitment: self.secrets.board_commitment(self.scheme.as_ref()),
                }))
            }
            ActionRequest::Fire(target) => {
                // public fields allow off-board cells
                let coordinate = Coordinate::new(target.row, target.col)?;
                match phase {
                    Phase::ShotPendingProof { .. } => Err(ProtocolError::PendingShotOpen),
                    Phase::Active { attacker } if *attacker == self.me => {
                        if snapshot.has_fired_at(&self.me, &coordinate) {
                            return Err(ProtocolError::AlreadyFired(coordinate));
                        }
                        Ok(Plan::Single(GameAction::Fire { game_id, coordinate }))
                    }
                    _ => Err(illegal(kind, phase)),
                }
            }
            ActionRequest::Prove => match phase {
                Phase::ShotPendingProof {
                    defender, coordinate, ..
                } if *defender == self.me => Ok(Plan::Prove {
                    coordinate: *coordinate,
                }),
                _ => Err(illegal(kind, phase)),
            },
        }
    }

    /// In-flight, optimistic and stalled flags
    fn check_local_flags(&self, kind: ActionKind, snapshot: &GameSnapshot) -> Result<(), ProtocolError> {
        let mut state = self.state.lock();
        if let Some(busy) = state.in_flight {
            return Err(ProtocolError::InFlight(busy));
        }

        let game_id = self.game_id;
        state.optimistic.retain(|action| {
            let observed = effect_observed(action, snapshot, &self.me);
            if observed {
                tracing::debug!("{}: {} now observed", game_id, action.kind());
            }
            !observed
        });
        if let Some(action) = state.optimistic.iter().find(|a| same_step(a.kind(), kind)) {
            return Err(ProtocolError::AwaitingObservation(action.kind()));
        }

        if let Some(stalled) = &state.stalled {
            if effect_observed(&stalled.action, snapshot, &self.me) {
                state.stalled = None;
            } else if same_step(stalled.action.kind(), kind) {
                return Err(ProtocolError::Stalled(stalled.action.kind()));
            }
        }
        Ok(())
    }
}

fn illegal(action: ActionKind, phase: impl ToString) -> ProtocolError {
    ProtocolError::IllegalAction {
        action,
        phase: phase.to_string(),
    }
}

/// Approve is the first half of staking
fn same_step(previous: ActionKind, requested: ActionKind) -> bool {
    let normalize = |kind| match kind {
        ActionKind::Approve => ActionKind::Stake,
        other => other,
    };
    normalize(previous) == normalize(requested)
}

/// Whether the snapshot already reflects `action` by `me`
fn effect_observed(action: &GameAction, snapshot: &GameSnapshot, me: &Address) -> bool {
    let session = snapshot.session.as_ref();
    match action {
        GameAction::Create { .. } => false,
        GameAction::Join { .. } => session.is_some_and(|s| s.player_b.as_ref() == Some(me)),
        GameAction::CommitCoin { .. } => snapshot.coin_state(me).is_some(),
        GameAction::RevealCoin { .. } => matches!(snapshot.coin_state(me), Some(CoinState::Revealed(_))),
        GameAction::Approve { .. } => false,
        GameAction::Stake { .. } => !snapshot.escrow.must_stake(me),
        GameAction::CommitBoard { .. } => snapshot.has_committed(me),
        GameAction::Fire { coordinate, .. } => snapshot.has_fired_at(me, coordinate),
        GameAction::Prove { coordinate, .. } => snapshot
            .resolved_shots
            .iter()
            .any(|s| s.shooter != *me && s.coordinate == *coordinate),
        GameAction::Cancel { .. } => snapshot.phase() == Some(&Phase::Cancelled),
    }
}
