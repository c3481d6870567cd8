//! Client Configuration

use anyhow::Context;
use ledger_submission::FeeConfig;
use salvo_runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Client configuration, loadable from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Indexer HTTP endpoint (fact queries)
    pub indexer_http_url: String,
    /// Indexer WebSocket endpoint (change signals)
    pub indexer_ws_url: String,
    /// Ledger RPC endpoint
    pub ledger_url: String,
    /// Local player account address
    pub account: Option<String>,
    /// Directory for the local store
    pub data_dir: PathBuf,
    /// Poll and push tuning
    pub runtime: RuntimeConfig,
    /// Fee and receipt tuning
    pub fees: FeeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            indexer_http_url: "http://127.0.0.1:8080".to_string(),
            indexer_ws_url: "ws://127.0.0.1:8081".to_string(),
            ledger_url: "http://127.0.0.1:5050".to_string(),
            account: None,
            data_dir: PathBuf::from("./salvo-data"),
            runtime: RuntimeConfig::default(),
            fees: FeeConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read a JSON config; missing fields keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("parsing config {:?}", path))?;
        Ok(config)
    }
}
