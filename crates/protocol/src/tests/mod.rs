//! Protocol scenarios against in-memory collaborators


use crate::{machine::ProtocolMachine, secrets::LocalSecrets};
use async_trait::async_trait;
use chain_types::{
    ActionKind, Address, CoinState, Fact, FeeEstimate, GameAction, GameId, Receipt, ReceiptStatus,
    ResourceBounds, ResourceEstimate, SessionFact, ShotState, TxHandle,
};
use ledger_submission::{FeeConfig, Ledger, LedgerError, SubmissionController};
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use salvo_board::{Commitment, Coordinate, FleetGenerator, ShotOutcome};
use salvo_runtime::Reconciler;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

pub(crate) const GAME: GameId = GameId(7);

pub(crate) fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

pub(crate) fn player_a() -> Address {
    addr("0xa")
}

pub(crate) fn player_b() -> Address {
    addr("0xb")
}

/// Records submissions and answers receipts from a per-kind script
#[derive(Default)]
pub(crate) struct FakeLedger {
    pub not_deployed: Mutex<bool>,
    /// Kinds whose receipts never arrive
    pub silent: Mutex<HashSet<ActionKind>>,
    /// Kinds that revert with the given reason
    pub reverts: Mutex<HashMap<ActionKind, String>>,
    /// Receipt lookups answered with "not yet" before the real receipt
    pub receipt_delay: Mutex<usize>,
    pub submitted: Mutex<Vec<(GameAction, ResourceBounds, Option<u64>)>>,
    receipts: Mutex<HashMap<String, Option<ReceiptStatus>>>,
}

impl FakeLedger {
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.submitted.lock().iter().map(|(a, _, _)| a.kind()).collect()
    }

    pub fn last_action(&self) -> Option<GameAction> {
        self.submitted.lock().last().map(|(a, _, _)| a.clone())
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn estimate_fee(&self, _: &Address, _: &GameAction) -> Result<FeeEstimate, LedgerError> {
        if *self.not_deployed.lock() {
            return Err(LedgerError::AccountNotDeployed);
        }
        Ok(FeeEstimate {
            execution: ResourceEstimate {
                amount: 1_000,
                unit_price: 10,
            },
            data: ResourceEstimate {
                amount: 100,
                unit_price: 1,
            },
            tip: 10,
        })
    }

    async fn submit(
        &self,
        _: &Address,
        action: &GameAction,
        bounds: &ResourceBounds,
        nonce: Option<u64>,
    ) -> Result<TxHandle, LedgerError> {
        let mut submitted = self.submitted.lock();
        submitted.push((action.clone(), *bounds, nonce));
        let hash = format!("0x{:x}", submitted.len());

        let kind = action.kind();
        let status = if self.silent.lock().contains(&kind) {
            None
        } else if let Some(reason) = self.reverts.lock().get(&kind) {
            Some(ReceiptStatus::Reverted { reason: reason.clone() })
        } else {
            Some(ReceiptStatus::Succeeded)
        };
        self.receipts.lock().insert(hash.clone(), status);

        Ok(TxHandle {
            hash,
            nonce: nonce.unwrap_or(submitted.len() as u64),
        })
    }

    async fn get_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>, LedgerError> {
        {
            let mut delay = self.receipt_delay.lock();
            if *delay > 0 {
                *delay -= 1;
                return Ok(None);
            }
        }
        let status = self.receipts.lock().get(&handle.hash).cloned().flatten();
        Ok(status.map(|status| Receipt {
            status,
            block_number: Some(1),
        }))
    }
}

pub(crate) fn controller(ledger: Arc<FakeLedger>) -> Arc<SubmissionController> {
    let config = FeeConfig::default()
        .with_receipt_timeout(Duration::from_millis(50))
        .with_receipt_poll_interval(Duration::from_millis(5));
    Arc::new(SubmissionController::new(ledger, config).unwrap())
}

pub(crate) fn secrets(seed: u64) -> LocalSecrets {
    LocalSecrets::generate(&FleetGenerator::new(), &mut StdRng::seed_from_u64(seed)).unwrap()
}

/// One player's machine over a reconciler fed directly with facts
pub(crate) struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub reconciler: Arc<Reconciler>,
    pub machine: ProtocolMachine,
}

impl Harness {
    pub fn new(me: Address) -> Self {
        Self::with_secrets(me, secrets(1))
    }

    pub fn with_secrets(me: Address, secrets: LocalSecrets) -> Self {
        let ledger = Arc::new(FakeLedger::default());
        let reconciler = Arc::new(Reconciler::new(GAME, me.clone()));
        reconciler.attach_fleet(secrets.fleet.clone());
        let machine = ProtocolMachine::new(me, reconciler.reader(), controller(ledger.clone()), secrets);
        Self {
            ledger,
            reconciler,
            machine,
        }
    }

    pub fn observe(&self, facts: Vec<Fact>) {
        self.reconciler.ingest_facts(facts);
    }
}

// ============ Fact builders ============

pub(crate) fn seated() -> Fact {
    Fact::Session(SessionFact {
        player_a: Some(player_a()),
        player_b: Some(player_b()),
        ..Default::default()
    })
}

pub(crate) fn staked_session(required: u128) -> Fact {
    Fact::Session(SessionFact {
        player_a: Some(player_a()),
        player_b: Some(player_b()),
        stake_required: Some(required),
        ..Default::default()
    })
}

pub(crate) fn coin(player: Address, state: CoinState) -> Fact {
    Fact::Coin { player, state }
}

pub(crate) fn committed(player: Address) -> Fact {
    Fact::BoardCommitted {
        player,
        commitment: Commitment([3; 32]),
    }
}

pub(crate) fn shot(shooter: Address, coordinate: Coordinate, outcome: Option<ShotOutcome>) -> Fact {
    let state = match outcome {
        Some(outcome) => ShotState::Resolved { outcome, turn: None },
        None => ShotState::Pending { turn: None },
    };
    Fact::Shot {
        shooter,
        coordinate,
        state,
    }
}

/// Seated, coin revealed (A attacks first), both boards committed
pub(crate) fn active_game() -> Vec<Fact> {
    vec![
        seated(),
        coin(player_a(), CoinState::Revealed(2)),
        coin(player_b(), CoinState::Revealed(4)),
        committed(player_a()),
        committed(player_b()),
    ]
}
