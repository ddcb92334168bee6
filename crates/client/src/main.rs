//! CLI for the auction registry.
//!
//! This binary provides commands for:
//! - Listing auctions and their bid histories
//! - Managing listings and auction phases (admin)
//! - Placing bids
//! - Advancing a mock ledger's chain

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::rpc_params;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use registry_client::input::{days_to_secs, format_timestamp, parse_start};
use registry_client::{
    spawn_poller, AuctionOrchestrator, ChannelTrigger, ClientConfig, ListingEntry,
    OrchestratorError, RefreshReason, RefreshTrigger, RemoteStore, RpcStore, Synchronizer,
};
use registry_types::rpc::{methods, BlockInfo};
use registry_types::{Account, ListingDraft, ListingId, Receipt};

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "CLI for the property auction registry")]
struct Cli {
    /// Ledger RPC endpoint (overrides the config file)
    #[arg(long)]
    rpc: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Account submitting transactions (hex)
    #[arg(long)]
    from: Option<Account>,

    /// Resource limit per transaction (overrides the config file)
    #[arg(long)]
    resource_budget: Option<u64>,

    /// Minimum bid increment (overrides the config file)
    #[arg(long)]
    bid_increment: Option<String>,

    /// Seconds to wait for a confirmation before giving up on display
    #[arg(long, default_value = "120")]
    wait_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all listings
    List,

    /// Show one listing
    Show {
        id: ListingId,
    },

    /// Show the bid history of a listing
    Bids {
        id: ListingId,
    },

    /// Show the admin account
    Admin,

    /// Print the registry whenever it changes
    Watch,

    /// Create a listing
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        location: String,

        /// Opaque image reference
        #[arg(long, default_value = "")]
        image_ref: String,

        /// Start price, e.g. 1.5
        #[arg(long)]
        start_price: String,

        /// Auction start, YYYY-MM-DDTHH:MM (UTC)
        #[arg(long)]
        start: String,

        /// Auction duration in days
        #[arg(long)]
        days: u64,
    },

    /// Update a listing that has not started; omitted fields keep their values
    Update {
        id: ListingId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        image_ref: Option<String>,

        #[arg(long)]
        start_price: Option<String>,

        /// Auction start, YYYY-MM-DDTHH:MM (UTC)
        #[arg(long)]
        start: Option<String>,

        /// Auction duration in days
        #[arg(long)]
        days: Option<u64>,
    },

    /// Delete a listing
    Delete {
        id: ListingId,
    },

    /// Open bidding
    Start {
        id: ListingId,
    },

    /// Close bidding
    End {
        id: ListingId,
    },

    /// Enable or disable a listing
    Toggle {
        id: ListingId,
    },

    /// Place a bid
    Bid {
        id: ListingId,

        /// Amount, e.g. 1.01
        amount: String,
    },

    /// Produce a block on a mock ledger
    AdvanceBlock,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(rpc) = &cli.rpc {
        config.rpc_endpoint = rpc.clone();
    }
    if let Some(budget) = cli.resource_budget {
        config.resource_budget = budget;
    }
    if let Some(increment) = &cli.bid_increment {
        config.bid_increment = increment.clone();
    }
    Ok(config)
}

fn print_summary(entry: &ListingEntry) {
    let listing = &entry.listing;
    println!(
        "  [{}] {} - {} ({}) highest: {}",
        listing.id,
        listing.title,
        listing.state(),
        listing.location,
        listing.reference_price()
    );
}

fn print_listing(entry: &ListingEntry, orchestrator: &AuctionOrchestrator) {
    let listing = &entry.listing;
    println!("Listing {}: {}", listing.id, listing.title);
    println!("  State: {}", listing.state());
    println!("  Location: {}", listing.location);
    println!("  Description: {}", listing.description);
    println!("  Start price: {}", listing.start_price);
    println!("  Start: {}", format_timestamp(listing.auction_start));
    println!("  End: {}", format_timestamp(listing.auction_end));
    match listing.highest_bidder {
        Some(bidder) => println!("  Highest bid: {} by {}", listing.highest_bid, bidder),
        None => println!("  Highest bid: none"),
    }
    println!("  Bids: {}", listing.bid_count);
    if listing.state().offers_bidding() {
        if let Some(min) = orchestrator.min_bid(listing.id) {
            println!("  Minimum bid: {}", min);
        }
    }
    if !listing.image_ref.is_empty() {
        println!("  Image: {} bytes", listing.image_ref.len());
    }
}

fn print_bids(entry: &ListingEntry) {
    if entry.bids.is_empty() {
        println!("No bids for listing {}", entry.listing.id);
        return;
    }
    println!("Bids for listing {}:", entry.listing.id);
    for (i, bid) in entry.bids.iter().enumerate() {
        println!(
            "  [{}] {} by {} at {}",
            i,
            bid.amount,
            bid.bidder,
            format_timestamp(bid.timestamp)
        );
    }
}

/// Run one intent while printing its phases.
async fn run_intent<F>(orchestrator: &AuctionOrchestrator, wait: Duration, intent: F) -> Result<()>
where
    F: std::future::Future<Output = Result<Receipt, OrchestratorError>>,
{
    let mut phases = orchestrator.subscribe_phases();
    let printer = tokio::spawn(async move {
        loop {
            match phases.recv().await {
                Ok(update) => {
                    println!("{}", update.phase.label());
                    if update.phase.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = tokio::time::timeout(wait, intent).await;
    // Give the printer a chance to flush the terminal phase.
    let _ = tokio::time::timeout(Duration::from_millis(100), printer).await;

    match outcome {
        Err(_) => bail!(
            "no confirmation after {}s; the transaction may still be included",
            wait.as_secs()
        ),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(receipt)) => {
            info!(tx = %receipt.tx_hash, block = receipt.block_height, "Confirmed");
            if let Some(id) = receipt.listing_id {
                println!("Listing ID: {}", id);
            }
            Ok(())
        }
    }
}

async fn require_admin(orchestrator: &AuctionOrchestrator) -> Result<()> {
    if !orchestrator.is_admin().await? {
        bail!("{} is not the registry admin", orchestrator.signer());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("registry_cli=info".parse()?)
                .add_directive("registry_client=warn".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let policy = config.policy()?;
    let wait = Duration::from_secs(cli.wait_secs);

    let rpc = Arc::new(RpcStore::new(&config.rpc_endpoint, config.confirmation_poll())?);
    let store: Arc<dyn RemoteStore> = rpc.clone();

    if let Commands::AdvanceBlock = cli.command {
        let block: BlockInfo = rpc
            .client()
            .request(methods::ADVANCE_BLOCK, rpc_params![])
            .await?;
        println!(
            "Block {} at {} ({} pending)",
            block.height,
            format_timestamp(block.timestamp),
            block.pending
        );
        return Ok(());
    }
    if let Commands::Admin = cli.command {
        println!("Admin: {}", store.admin().await?);
        return Ok(());
    }

    let synchronizer = Arc::new(Synchronizer::new(store.clone()));
    synchronizer
        .request_refresh(RefreshReason::Startup)
        .await
        .context("initial sync failed")?;

    let signer = cli.from.unwrap_or(Account::ZERO);
    let orchestrator =
        AuctionOrchestrator::new(store.clone(), synchronizer.clone(), signer, policy);
    let signed = || -> Result<()> {
        if signer.is_zero() {
            bail!("--from is required for this command");
        }
        Ok(())
    };

    match cli.command {
        Commands::List => {
            let snapshot = orchestrator.snapshot();
            if snapshot.is_empty() {
                println!("No listings found");
            } else {
                println!("Listings:");
                snapshot.entries().for_each(print_summary);
            }
        }

        Commands::Show { id } => {
            let snapshot = orchestrator.snapshot();
            let entry = snapshot
                .get(id)
                .ok_or_else(|| anyhow!("Listing {} not found", id))?;
            print_listing(entry, &orchestrator);
        }

        Commands::Bids { id } => {
            let snapshot = orchestrator.snapshot();
            let entry = snapshot
                .get(id)
                .ok_or_else(|| anyhow!("Listing {} not found", id))?;
            print_bids(entry);
        }

        Commands::Watch => {
            let (trigger, _worker) = ChannelTrigger::spawn(synchronizer.clone());
            let interval = config.poll_interval().unwrap_or(Duration::from_secs(10));
            let _poller = spawn_poller(Arc::new(trigger), interval);
            let mut snapshots = synchronizer.subscribe();
            let mut last = synchronizer.snapshot();

            println!("Listings:");
            last.entries().for_each(print_summary);
            loop {
                tokio::select! {
                    changed = snapshots.changed() => {
                        changed?;
                        let next = snapshots.borrow_and_update().clone();
                        if !next.same_content(&last) {
                            println!("Listings (generation {}):", next.generation());
                            next.entries().for_each(print_summary);
                            last = next;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        Commands::Add {
            title,
            description,
            location,
            image_ref,
            start_price,
            start,
            days,
        } => {
            signed()?;
            require_admin(&orchestrator).await?;
            let draft = ListingDraft {
                title: Some(title),
                description: Some(description),
                location: Some(location),
                image_ref,
                start_price: Some(start_price),
                auction_start: Some(parse_start(&start)?),
                auction_duration: Some(days_to_secs(days)?),
            };
            run_intent(&orchestrator, wait, orchestrator.add_listing(&draft)).await?;
        }

        Commands::Update {
            id,
            title,
            description,
            location,
            image_ref,
            start_price,
            start,
            days,
        } => {
            signed()?;
            require_admin(&orchestrator).await?;
            let snapshot = orchestrator.snapshot();
            let current = snapshot
                .listing(id)
                .ok_or_else(|| anyhow!("Listing {} not found", id))?;

            let mut draft = ListingDraft::from_listing(current);
            if title.is_some() {
                draft.title = title;
            }
            if description.is_some() {
                draft.description = description;
            }
            if location.is_some() {
                draft.location = location;
            }
            if let Some(image_ref) = image_ref {
                draft.image_ref = image_ref;
            }
            if start_price.is_some() {
                draft.start_price = start_price;
            }
            if let Some(start) = start {
                draft.auction_start = Some(parse_start(&start)?);
            }
            if let Some(days) = days {
                draft.auction_duration = Some(days_to_secs(days)?);
            }
            run_intent(&orchestrator, wait, orchestrator.update_listing(id, &draft)).await?;
        }

        Commands::Delete { id } => {
            signed()?;
            require_admin(&orchestrator).await?;
            run_intent(&orchestrator, wait, orchestrator.delete_listing(id)).await?;
        }

        Commands::Start { id } => {
            signed()?;
            require_admin(&orchestrator).await?;
            run_intent(&orchestrator, wait, orchestrator.start_auction(id)).await?;
        }

        Commands::End { id } => {
            signed()?;
            require_admin(&orchestrator).await?;
            run_intent(&orchestrator, wait, orchestrator.end_auction(id)).await?;
        }

        Commands::Toggle { id } => {
            signed()?;
            require_admin(&orchestrator).await?;
            run_intent(&orchestrator, wait, orchestrator.toggle_active(id)).await?;
        }

        Commands::Bid { id, amount } => {
            signed()?;
            run_intent(&orchestrator, wait, orchestrator.place_bid(id, &amount)).await?;
        }

        Commands::Admin | Commands::AdvanceBlock => {}
    }

    Ok(())
}
