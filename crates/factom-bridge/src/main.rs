#![doc = include_str!("../README.md")]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, subscriber::set_global_default};
use tracing_subscriber::filter::EnvFilter;

use factom_bridge::{
    create_app, Address, Bridge, BridgeClient, BridgeConfig, LogPayoutSink, RequestId,
    SqliteLedgerStore, SystemClock, Timestamp,
};
use factom_spv_verify::{
    check_inclusion, AnchorRecord, AnchorState, FactoidTransaction, Hash32, ProofBundle,
    ProofParams, Sha256Hasher, TransactionParams,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the database storing the ledger
    #[arg(long, env = "BRIDGE_DB_PATH", default_value = "./.bridge_data/ledger.db")]
    db_path: PathBuf,
    /// Path to a JSON bridge configuration (optional)
    #[arg(long, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a request escrowing funds against a Factom payment
    Issue {
        #[arg(long)]
        issuer: Address,
        /// RCD hash of the Factom address to be paid
        #[arg(long)]
        output_commitment: Hash32,
        /// Requested amount in factoshis
        #[arg(long)]
        amount: u64,
        /// Unix timestamp (seconds) after which the request can be refunded
        #[arg(long)]
        deadline: Timestamp,
        /// Escrowed value in wei
        #[arg(long)]
        escrow: u128,
    },
    /// Book an issued request
    Book {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        caller: Address,
    },
    /// Submit the paying Factom transaction of a booked request
    SubmitTx {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        caller: Address,
        /// JSON file with the transaction params
        #[arg(long)]
        params: PathBuf,
    },
    /// Fulfill a request with an inclusion proof
    Fulfill {
        #[arg(long)]
        id: u64,
        /// JSON file with the proof params
        #[arg(long)]
        proof: PathBuf,
    },
    /// Refund an expired request to its issuer
    Refund {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        caller: Address,
    },
    /// Show a request and its booking
    Show {
        #[arg(long)]
        id: u64,
    },
    /// Record a trusted anchor
    AddAnchor {
        #[arg(long)]
        height: u32,
        #[arg(long)]
        merkle_root: Hash32,
    },
    /// List the trusted anchors
    Anchors,
    /// Compute the canonical hash of a transaction params file
    TxHash {
        #[arg(long)]
        params: PathBuf,
    },
    /// Check a proof against the recorded anchors without touching any request
    Verify {
        #[arg(long)]
        tx_hash: Hash32,
        #[arg(long)]
        proof: PathBuf,
    },
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber_builder =
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(env_filter);

    let subscriber = subscriber_builder.with_writer(std::io::stderr).finish();
    set_global_default(subscriber).expect("Failed to set subscriber");
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, anyhow::Error> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_proof(path: &Path) -> Result<ProofBundle, anyhow::Error> {
    let params: ProofParams = read_json(path)?;
    Ok(ProofBundle::try_from(params)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(command: Command, client: &BridgeClient) -> Result<(), anyhow::Error> {
    match command {
        Command::Issue {
            issuer,
            output_commitment,
            amount,
            deadline,
            escrow,
        } => {
            let id = client
                .issue_request(issuer, output_commitment, amount, deadline, escrow)
                .await?;
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::Book { id, caller } => {
            let booking = client.book_request(RequestId(id), caller).await?;
            print_json(&booking)
        }
        Command::SubmitTx { id, caller, params } => {
            let params: TransactionParams = read_json(&params)?;
            let tx_hash = client
                .submit_booked_request_transaction_params(RequestId(id), caller, params)
                .await?;
            print_json(&serde_json::json!({ "tx_hash": tx_hash }))
        }
        Command::Fulfill { id, proof } => {
            let bundle = read_proof(&proof)?;
            let record = client.fulfill_request(RequestId(id), bundle).await?;
            print_json(&record)
        }
        Command::Refund { id, caller } => {
            let record = client.refund_request(RequestId(id), caller).await?;
            print_json(&record)
        }
        Command::Show { id } => {
            let request = client.get_request(RequestId(id)).await?;
            let booking = client.find_booking(RequestId(id)).await?;
            print_json(&serde_json::json!({ "request": request, "booking": booking }))
        }
        Command::AddAnchor {
            height,
            merkle_root,
        } => {
            client
                .record_anchor(AnchorRecord {
                    height,
                    merkle_root,
                })
                .await?;
            Ok(())
        }
        Command::Anchors => print_json(&client.get_anchors().await?),
        Command::TxHash { params } => {
            let params: TransactionParams = read_json(&params)?;
            let transaction = FactoidTransaction::try_from(&params)?;
            transaction.check_rcds(&Sha256Hasher)?;
            print_json(&serde_json::json!({
                "tx_hash": transaction.hash(&Sha256Hasher),
                "timestamp": transaction.timestamp(),
            }))
        }
        Command::Verify { tx_hash, proof } => {
            let bundle = read_proof(&proof)?;
            let anchors = AnchorState::from_records(client.get_anchors().await?)?;
            let root = check_inclusion(&tx_hash, &bundle, &anchors, &Sha256Hasher)?;
            print_json(&serde_json::json!({ "anchor_root": root }))
        }
    }
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    let store = SqliteLedgerStore::open(&cli.db_path).await?;
    let bridge = Bridge::open(
        config,
        Arc::new(store),
        Arc::new(SystemClock),
        Arc::new(LogPayoutSink),
    )
    .await?;

    let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
    let (mut server, client) = create_app(bridge, rx_shutdown);
    let server_handle = tokio::spawn(async move { server.run().await });

    let res = execute(cli.command, &client).await;

    tx_shutdown.send(()).ok();
    if server_handle.await.is_err() {
        error!("Bridge server task panicked");
    }
    res
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!("Opening bridge ledger at {}", cli.db_path.display());

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}
