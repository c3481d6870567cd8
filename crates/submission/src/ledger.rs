//! Ledger collaborator
//!
//! The controller only needs three calls from the ledger: estimate, submit and
//! receipt lookup. `JsonRpcLedger` speaks them over JSON-RPC; tests substitute
//! in-memory implementations.

use async_trait::async_trait;
use chain_types::{Address, FeeEstimate, GameAction, Receipt, ResourceBounds, TxHandle};
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC method names
pub mod methods {
    pub const ESTIMATE_FEE: &str = "ledger_estimateFee";
    pub const SUBMIT: &str = "ledger_submit";
    pub const GET_RECEIPT: &str = "ledger_getReceipt";
}

/// Error code the ledger returns when the sending account has no contract yet
pub const ACCOUNT_NOT_DEPLOYED_CODE: i32 = 20;

/// Ledger call errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not deployed")]
    AccountNotDeployed,

    #[error("Rejected by ledger: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Ledger submit/read interface
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Estimate the resources `action` will consume when sent by `sender`
    async fn estimate_fee(&self, sender: &Address, action: &GameAction) -> Result<FeeEstimate, LedgerError>;

    /// Submit `action` with the given bounds; `nonce` pins the account nonce
    /// for a replacement transaction
    async fn submit(
        &self,
        sender: &Address,
        action: &GameAction,
        bounds: &ResourceBounds,
        nonce: Option<u64>,
    ) -> Result<TxHandle, LedgerError>;

    /// Receipt of an included transaction, `None` while not yet included
    async fn get_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>, LedgerError>;
}

// ============ Request Types ============

#[derive(Debug, Serialize)]
struct EstimateRequest<'a> {
    sender: &'a Address,
    action: &'a GameAction,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    sender: &'a Address,
    action: &'a GameAction,
    bounds: &'a ResourceBounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
}

// ============ JSON-RPC Client ============

/// Ledger client over JSON-RPC/HTTP
pub struct JsonRpcLedger {
    client: HttpClient,
    url: String,
}

impl JsonRpcLedger {
    /// Connect to a ledger endpoint
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, LedgerError> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn estimate_fee(&self, sender: &Address, action: &GameAction) -> Result<FeeEstimate, LedgerError> {
        let request = EstimateRequest { sender, action };
        self.client
            .request(methods::ESTIMATE_FEE, rpc_params![request])
            .await
            .map_err(classify_error)
    }

    async fn submit(
        &self,
        sender: &Address,
        action: &GameAction,
        bounds: &ResourceBounds,
        nonce: Option<u64>,
    ) -> Result<TxHandle, LedgerError> {
        let request = SubmitRequest {
            sender,
            action,
            bounds,
            nonce,
        };
        self.client
            .request(methods::SUBMIT, rpc_params![request])
            .await
            .map_err(classify_error)
    }

    async fn get_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>, LedgerError> {
        self.client
            .request(methods::GET_RECEIPT, rpc_params![&handle.hash])
            .await
            .map_err(classify_error)
    }
}

/// Map a client error onto the ledger taxonomy
fn classify_error(error: ClientError) -> LedgerError {
    match error {
        ClientError::Call(object) => {
            let message = object.message().to_string();
            if object.code() == ACCOUNT_NOT_DEPLOYED_CODE || is_not_deployed_message(&message) {
                LedgerError::AccountNotDeployed
            } else {
                LedgerError::Rejected(message)
            }
        }
        other => LedgerError::Transport(other.to_string()),
    }
}

fn is_not_deployed_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not deployed") || lower.contains("contract not found")
}
