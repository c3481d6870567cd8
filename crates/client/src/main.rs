//! Salvo Client
//!
//! Headless player for two-party salvo games on a remote ledger.
//! `create` opens a game, `play` follows (and optionally plays) the active
//! game, `status` prints one fully polled snapshot as JSON.

use anyhow::{bail, Context, Result};
use chain_types::{Address, GameId};
use clap::{Parser, Subcommand};
use ledger_submission::{JsonRpcLedger, SubmissionController};
use salvo_protocol::Session;
use salvo_runtime::{poll_all, Indexer, JsonRpcIndexer, LocalStore, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod player;

use config::ClientConfig;

/// How often `play` re-evaluates without a new snapshot
const IDLE_TICK: Duration = Duration::from_secs(15);

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a new game
    Create {
        /// Stake each player must post (0 = free game)
        #[arg(long, default_value = "0")]
        stake: u128,
    },
    /// Follow a game and perform the local player's obligations
    Play {
        /// Game to play; defaults to the game active at last shutdown
        #[arg(long)]
        game: Option<u64>,

        /// Fire at random untried cells when it is our turn
        #[arg(long)]
        auto_fire: bool,
    },
    /// Poll a game once and print its snapshot
    Status {
        #[arg(long)]
        game: u64,
    },
}

/// Salvo headless client
#[derive(Parser, Debug)]
#[command(name = "salvo")]
#[command(about = "Play two-party salvo games against a remote ledger", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Indexer HTTP endpoint
    #[arg(long, global = true)]
    indexer_url: Option<String>,

    /// Indexer WebSocket endpoint
    #[arg(long, global = true)]
    indexer_ws_url: Option<String>,

    /// Ledger RPC endpoint
    #[arg(long, global = true)]
    ledger_url: Option<String>,

    /// Local player account address
    #[arg(long, global = true)]
    account: Option<String>,

    /// Data directory for the local store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.indexer_url {
            config.indexer_http_url = url.clone();
        }
        if let Some(url) = &self.indexer_ws_url {
            config.indexer_ws_url = url.clone();
        }
        if let Some(url) = &self.ledger_url {
            config.ledger_url = url.clone();
        }
        if let Some(account) = &self.account {
            config.account = Some(account.clone());
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.client_config()?;

    match args.command {
        Command::Create { stake } => run_create(&config, stake).await,
        Command::Play { game, auto_fire } => run_play(&config, game.map(GameId), auto_fire).await,
        Command::Status { game } => run_status(&config, GameId(game)).await,
    }
}

fn account(config: &ClientConfig) -> Result<Address> {
    let Some(raw) = &config.account else {
        bail!("no account configured; pass --account or set it in the config file");
    };
    Address::parse(raw).with_context(|| format!("invalid account address {:?}", raw))
}

fn indexer(config: &ClientConfig) -> Result<Arc<dyn Indexer>> {
    let indexer = JsonRpcIndexer::new(
        &config.indexer_http_url,
        &config.indexer_ws_url,
        config.runtime.request_timeout(),
    )?;
    Ok(Arc::new(indexer))
}

fn session(config: &ClientConfig) -> Result<Session> {
    let me = account(config)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(LocalStore::open(&config.data_dir)?);

    let ledger = Arc::new(JsonRpcLedger::new(&config.ledger_url, config.runtime.request_timeout())?);
    let controller = Arc::new(SubmissionController::new(ledger, config.fees.clone())?);

    Ok(Session::new(me, indexer(config)?, controller, store, config.runtime.clone()))
}

/// Submit a `Create` and report the outcome
async fn run_create(config: &ClientConfig, stake: u128) -> Result<()> {
    tracing::info!("Creating game (stake {})", stake);
    tracing::info!("  Ledger: {}", config.ledger_url);

    let session = session(config)?;
    let execution = session.create_game(stake).await?;

    if !execution.outcome.is_success() {
        bail!("create did not succeed: {:?}", execution.outcome);
    }
    tracing::info!("Game created in tx {}; find its id on the indexer", execution.submitted.handle.hash);
    Ok(())
}

/// Follow a game until it ends or Ctrl+C
async fn run_play(config: &ClientConfig, game: Option<GameId>, auto_fire: bool) -> Result<()> {
    tracing::info!("Starting salvo player");
    tracing::info!("  Indexer: {} / {}", config.indexer_http_url, config.indexer_ws_url);
    tracing::info!("  Ledger: {}", config.ledger_url);
    tracing::info!("  Data directory: {:?}", config.data_dir);
    tracing::info!("  Auto fire: {}", auto_fire);

    let mut session = session(config)?;
    let machine = match game {
        Some(game) => session.switch_game(game).await?,
        None => match session.restore().await? {
            Some(machine) => machine,
            None => bail!("no active game to restore; pass --game"),
        },
    };

    tracing::info!("Playing {} as {}. Press Ctrl+C to stop.", machine.game_id(), machine.me());

    let mut reader = machine.reader();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let state = reader.mark_seen();
        tracing::debug!(
            "{} v{}\ndefense:\n{}\nattack:\n{}",
            machine.game_id(),
            state.snapshot.version,
            state.views.defense.render(),
            state.views.attack.render()
        );

        if let Some(phase) = state.snapshot.phase() {
            if phase.is_terminal() {
                tracing::info!("{} finished: {}", machine.game_id(), phase);
                break;
            }
        }

        player::step(&machine, auto_fire).await;

        tokio::select! {
            changed = reader.changed() => {
                if !changed {
                    tracing::warn!("Reconciler for {} went away", machine.game_id());
                    break;
                }
            }
            _ = tokio::time::sleep(IDLE_TICK) => {
                player::retry(&machine, config.fees.tip_bump).await;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    session.close().await;
    tracing::info!("Player stopped");

    Ok(())
}

/// One full poll, printed as JSON
async fn run_status(config: &ClientConfig, game: GameId) -> Result<()> {
    let me = match &config.account {
        Some(_) => account(config)?,
        None => Address::zero(),
    };

    let indexer = indexer(config)?;
    let reconciler = Reconciler::new(game, me);
    poll_all(indexer.as_ref(), &reconciler).await;

    let state = reconciler.current();
    println!("{}", serde_json::to_string_pretty(&state.snapshot)?);
    if !state.snapshot.anomalies.is_empty() {
        tracing::warn!("{} has {} reconciliation anomalies", game, state.snapshot.anomalies.len());
    }
    Ok(())
}
