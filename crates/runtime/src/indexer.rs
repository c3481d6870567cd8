//! Indexer collaborator
//!
//! Queries return raw records (see `chain_types::record`); subscriptions only
//! say "something changed for this game" and carry no usable payload.

use async_trait::async_trait;
use chain_types::{FactBatch, GameId};
use futures::{stream::BoxStream, StreamExt};
use jsonrpsee::{
    core::client::{ClientT, SubscriptionClientT},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
    ws_client::WsClientBuilder,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC method names
pub mod methods {
    pub const GET_FACTS: &str = "indexer_getFacts";
    pub const SUBSCRIBE_GAME: &str = "indexer_subscribeGame";
    pub const UNSUBSCRIBE_GAME: &str = "indexer_unsubscribeGame";
}

/// Indexer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),
}

/// Which record collections a query covers
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FactScope {
    /// Game records and coin flips
    Session,
    /// Board commitments and shots
    Board,
    /// Escrow deposits
    Escrow,
    All,
}

impl FactScope {
    /// The three streams polled independently
    pub const STREAMS: [FactScope; 3] = [FactScope::Session, FactScope::Board, FactScope::Escrow];
}

impl std::fmt::Display for FactScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FactScope::Session => "session",
            FactScope::Board => "board",
            FactScope::Escrow => "escrow",
            FactScope::All => "all",
        };
        f.write_str(name)
    }
}

/// Indexer query/subscribe interface
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Fetch every record in `scope` for `game`
    async fn query_facts(&self, game: GameId, scope: FactScope) -> Result<FactBatch, IndexerError>;

    /// Change signals for `game`; the stream ends when the subscription drops
    async fn subscribe(&self, game: GameId) -> Result<BoxStream<'static, ()>, IndexerError>;
}

#[derive(Debug, Serialize)]
struct FactsRequest {
    game_id: GameId,
    scope: FactScope,
}

/// Indexer client: HTTP for queries, WebSocket for change signals
pub struct JsonRpcIndexer {
    http: HttpClient,
    ws_url: String,
    request_timeout: Duration,
}

impl JsonRpcIndexer {
    pub fn new(http_url: &str, ws_url: &str, request_timeout: Duration) -> Result<Self, IndexerError> {
        let http = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(http_url)
            .map_err(|e| IndexerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            ws_url: ws_url.to_string(),
            request_timeout,
        })
    }
}

#[async_trait]
impl Indexer for JsonRpcIndexer {
    async fn query_facts(&self, game: GameId, scope: FactScope) -> Result<FactBatch, IndexerError> {
        let request = FactsRequest { game_id: game, scope };
        self.http
            .request(methods::GET_FACTS, rpc_params![request])
            .await
            .map_err(|e| IndexerError::Transport(e.to_string()))
    }

    async fn subscribe(&self, game: GameId) -> Result<BoxStream<'static, ()>, IndexerError> {
        // One connection per subscription; a stale socket is replaced by resubscribing.
        let client = WsClientBuilder::default()
            .request_timeout(self.request_timeout)
            .build(&self.ws_url)
            .await
            .map_err(|e| IndexerError::Subscription(e.to_string()))?;

        let subscription = client
            .subscribe::<serde_json::Value, _>(
                methods::SUBSCRIBE_GAME,
                rpc_params![game],
                methods::UNSUBSCRIBE_GAME,
            )
            .await
            .map_err(|e| IndexerError::Subscription(e.to_string()))?;

        tracing::debug!("Subscribed to indexer signals for {} at {}", game, self.ws_url);

        // The client travels with the stream so the connection lives as long as it.
        let signals = futures::stream::unfold((client, subscription), |(client, mut subscription)| async move {
            match subscription.next().await {
                Some(Ok(_)) => Some(((), (client, subscription))),
                Some(Err(e)) => {
                    tracing::debug!("Dropping undecodable push payload stream: {}", e);
                    None
                }
                None => None,
            }
        });

        Ok(signals.boxed())
    }
}
