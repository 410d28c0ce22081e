//! Tollgate payment node — entry point.
//!
//! Wires the engine together: RocksDB-backed ledger, JSON-RPC chain client,
//! polling scheduler, webhook dispatcher, and the HTTP API, with
//! configuration from a TOML file or defaults.

mod api;
mod config;
mod state;
mod storage;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tollgate_chain::{ChainClient, HttpChainClient};
use tollgate_core::PaymentStatus;
use tollgate_engine::{
    AddressIssuer, EventBus, NotificationDispatcher, NullDispatcher, PaymentEvent, PaymentLedger,
    PollingScheduler, SweepConfig, SweepEngine,
};
use tracing_subscriber::EnvFilter;

use config::TollgateConfig;
use state::AppState;
use storage::RocksStore;
use webhook::WebhookDispatcher;

/// Tollgate Payment Node
#[derive(Parser, Debug)]
#[command(name = "tollgate-node", version, about = "Tollgate payment node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "tollgate.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the chain node endpoint.
    #[arg(long)]
    node_endpoint: Option<String>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TollgateConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(endpoint) = args.node_endpoint {
        config.chain.endpoint = endpoint;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    // CLI flag wins, then RUST_LOG, then the [logging] section.
    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.logging.effective_level(None))),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.json_output() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if args.init {
        let config = TollgateConfig::default();
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    let custodial_address = config.validate().context("invalid configuration")?;

    tracing::info!("Tollgate node v{}", env!("CARGO_PKG_VERSION"));

    // Ledger, rebuilt from disk: the store is the single source of truth.
    let store = Arc::new(RocksStore::open(&config.storage.data_dir)?);
    let ledger = Arc::new(PaymentLedger::open(store)?);
    for address in ledger.addresses_in(PaymentStatus::Settling) {
        // A crash mid-sweep is indistinguishable from a broadcast that went
        // through; the operator has to check the chain before retrying.
        tracing::warn!(address = %address, "record was mid-sweep at shutdown, needs operator review");
    }

    let chain: Arc<dyn ChainClient> = Arc::new(HttpChainClient::new(
        config.chain.endpoint.clone(),
        Duration::from_secs(config.chain.request_timeout_secs),
    )?);
    let chain_id = match config.chain.chain_id {
        Some(id) => id,
        None => chain
            .chain_id()
            .await
            .context("discovering chain id from node")?,
    };
    tracing::info!(endpoint = %config.chain.endpoint, chain_id, "chain node configured");

    let events = EventBus::default();
    let sweeper = Arc::new(SweepEngine::new(
        Arc::clone(&ledger),
        Arc::clone(&chain),
        SweepConfig {
            custodial_address,
            gas_price: config.sweep.gas_price.into(),
            gas_limit: config.sweep.gas_limit,
            chain_id,
        },
        events.clone(),
    ));
    let issuer = Arc::new(AddressIssuer::new(
        Arc::clone(&ledger),
        chrono::Duration::seconds(config.payments.window_secs as i64),
    ));
    let notifier: Arc<dyn NotificationDispatcher> = match &config.webhook.url {
        Some(url) => {
            tracing::info!(url = %url, signed = config.webhook.secret.is_some(), "webhook notifications enabled");
            Arc::new(WebhookDispatcher::new(
                url.clone(),
                config.webhook.secret.clone(),
            )?)
        }
        None => Arc::new(NullDispatcher),
    };
    let scheduler = Arc::new(PollingScheduler::new(
        Arc::clone(&ledger),
        Arc::clone(&chain),
        Arc::clone(&sweeper),
        notifier,
        events.clone(),
        Duration::from_secs(config.payments.poll_interval_secs),
    ));
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run());

    // Realtime transports subscribe to the same bus; the node itself logs
    // every delivery.
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(PaymentEvent::Confirmed { address, balance }) => {
                    tracing::info!(address = %address, balance = %balance, "payment_confirmed");
                }
                Ok(PaymentEvent::Swept {
                    address,
                    tx_hash,
                    net_amount,
                }) => {
                    tracing::info!(address = %address, tx = %tx_hash, net_amount = %net_amount, "payment_swept");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app_state = Arc::new(AppState::new(
        ledger,
        issuer,
        sweeper,
        Arc::clone(&scheduler),
        chain,
        config.api.api_keys.clone(),
    ));
    let app = api::build_router(app_state);
    let listener = tokio::net::TcpListener::bind(config.api_addr())
        .await
        .with_context(|| format!("binding API listener on {}", config.api_addr()))?;
    tracing::info!(listen_addr = %config.api_addr(), "HTTP API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The API has drained; stop the scan loop and wait for it.
    scheduler.stop();
    scheduler_task.await?;

    tracing::info!("Tollgate node exited cleanly");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("received shutdown signal");
}
