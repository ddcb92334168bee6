//! Mock ledger server for local testing of the auction registry.
//!
//! This provides a JSON-RPC server that simulates the registry contract and
//! its chain without requiring a real blockchain. Blocks are produced on a
//! fixed interval and on demand through `admin_advanceBlock`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::server::Server;
use parking_lot::RwLock;
use tracing::{info, warn};

use registry_module::{Ledger, LedgerGenesisConfig};
use registry_types::Account;

mod server;
use server::{MockLedgerApiServer, MockLedgerServer};

#[derive(Parser)]
#[command(name = "mock-ledger")]
#[command(about = "JSON-RPC server simulating the auction registry ledger")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8545")]
    addr: SocketAddr,

    /// Genesis config file (JSON)
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Admin account (overrides the genesis file)
    #[arg(long)]
    admin: Option<Account>,

    /// Milliseconds between produced blocks; 0 produces blocks only on demand
    #[arg(long, default_value = "2000")]
    block_interval_ms: u64,
}

fn load_genesis(args: &Args) -> Result<LedgerGenesisConfig> {
    let mut config = match &args.genesis {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => LedgerGenesisConfig::default(),
    };
    if let Some(admin) = args.admin {
        config.admin = admin;
    }
    config.validate()?;
    Ok(config)
}

fn spawn_block_producer(
    ledger: Arc<RwLock<Ledger>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut chain = ledger.write();
            let receipts = chain.produce_block();
            if receipts.is_empty() {
                continue;
            }
            let height = chain.block_info().height;
            for receipt in &receipts {
                match &receipt.failure_reason {
                    None => info!(height, tx = %receipt.tx_hash, "Transaction executed"),
                    Some(reason) => {
                        warn!(height, tx = %receipt.tx_hash, %reason, "Transaction failed")
                    }
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_ledger=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let genesis = load_genesis(&args)?;
    info!(admin = %genesis.admin, "Loaded genesis");

    let ledger = Arc::new(RwLock::new(Ledger::new(&genesis)));

    let producer = (args.block_interval_ms > 0).then(|| {
        spawn_block_producer(
            ledger.clone(),
            Duration::from_millis(args.block_interval_ms),
        )
    });

    info!("Starting mock ledger server on {}", args.addr);

    let server = Server::builder().build(args.addr).await?;
    let handle = server.start(MockLedgerServer::new(ledger).into_rpc());

    info!("Mock ledger server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    if let Some(producer) = producer {
        producer.abort();
    }
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
