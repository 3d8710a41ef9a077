//! fir-sim: drive a scripted FIR registry session
//!
//! Runs a scripted session (connect, file reports, progress them as the
//! administrator) against the in-memory registry by default and prints the
//! resulting records. With `--wallet rpc` the wallet side is a JSON-RPC endpoint
//! instead of the built-in mock, and with `--ledger rpc` the registry is a
//! deployed contract reached through the same endpoint.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use fir_ledger::wallet::WatchHandle;
use fir_ledger::{
    Address, ChainId, ContractConnector, InMemoryRegistry, JsonRpcConnector, JsonRpcWallet,
    LedgerConfig, LedgerSession, MockWallet, WalletProvider,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WalletKind {
    /// Built-in mock wallet with scripted accounts
    Mock,
    /// JSON-RPC endpoint from the config file or --rpc-url
    Rpc,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LedgerKind {
    /// In-process simulated registry
    Memory,
    /// Deployed registry contract behind the JSON-RPC endpoint
    Rpc,
}

#[derive(Parser)]
#[command(name = "fir-sim")]
#[command(about = "Run a scripted FIR registry session")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "fir-sim.toml")]
    config: String,

    /// Registry contract address (overrides config file)
    #[arg(long, env = "FIR_CONTRACT_ADDRESS")]
    contract_address: Option<Address>,

    /// Target chain id (overrides config file)
    #[arg(long, env = "FIR_CHAIN_ID")]
    chain_id: Option<u64>,

    /// JSON-RPC endpoint (overrides config file)
    #[arg(long, env = "FIR_RPC_URL")]
    rpc_url: Option<String>,

    /// Wallet implementation
    #[arg(long, value_enum, default_value = "mock")]
    wallet: WalletKind,

    /// Registry implementation
    #[arg(long, value_enum, default_value = "memory")]
    ledger: LedgerKind,

    /// Registry administrator
    #[arg(long, env = "FIR_ADMIN_ADDRESS")]
    admin: Option<Address>,

    /// Chain the mock wallet starts on
    #[arg(long, default_value_t = 1)]
    wallet_chain: u64,

    /// Number of reports to file
    #[arg(short, long, default_value_t = 3)]
    reports: usize,

    /// Keep processing wallet and contract events after the script
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fir_ledger=info".parse()?)
                .add_directive("fir_sim=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        LedgerConfig::from_toml(&content)?
    } else {
        info!(path = %cli.config, "Config file not found, using defaults");
        LedgerConfig::default()
    };

    if let Some(address) = cli.contract_address {
        config.contract_address = address;
    }
    if let Some(chain) = cli.chain_id {
        config.chain_id = ChainId(chain);
    }
    if let Some(url) = cli.rpc_url.clone() {
        config.rpc.url = url;
    }

    info!(contract = %config.contract_address, chain = %config.chain_id, "Starting fir-sim");

    let citizen = Address::from_bytes([0xc1; 20]);
    let admin = cli.admin.unwrap_or(Address::from_bytes([0xad; 20]));
    let connector: Arc<dyn ContractConnector> = match cli.ledger {
        LedgerKind::Memory => Arc::new(InMemoryRegistry::new(config.contract_address, admin)),
        LedgerKind::Rpc => {
            info!(url = %config.rpc.url, "Using JSON-RPC registry");
            Arc::new(JsonRpcConnector::new(&config.rpc)?)
        }
    };

    let (wallet, _watch): (Arc<dyn WalletProvider>, Option<WatchHandle>) = match cli.wallet {
        WalletKind::Mock => {
            let wallet: Arc<dyn WalletProvider> =
                Arc::new(MockWallet::new(ChainId(cli.wallet_chain), vec![citizen, admin]));
            (wallet, None)
        }
        WalletKind::Rpc => {
            let wallet = Arc::new(JsonRpcWallet::new(&config.rpc)?);
            info!(url = wallet.url(), "Using JSON-RPC wallet");
            let watch = wallet.watch(Duration::from_millis(config.rpc.poll_interval_ms));
            let wallet: Arc<dyn WalletProvider> = wallet;
            (wallet, Some(watch))
        }
    };

    let target = config.chain_id;
    let crime_types = config.crime_types.clone();
    let mut session = LedgerSession::new(config, Some(wallet), connector);

    let accounts = session.connect().await?;
    println!("{}", session.network().summary(target));
    if let Some(active) = session.active_identity() {
        println!(
            "Connected as {} ({} account(s) exposed)",
            active.short(),
            accounts.len()
        );
    }

    for i in 0..cli.reports {
        let crime_type = crime_types
            .get(i % crime_types.len().max(1))
            .map(String::as_str)
            .unwrap_or("Other");
        let details = format!("Simulated report #{} ({crime_type})", i + 1);
        match session.register(&details, crime_type).await {
            Ok(receipt) => println!("Filed report, tx {} in block {}", receipt.hash, receipt.block_number),
            Err(e) => warn!(error = %e, "Filing report failed"),
        }
    }
    drain_events(&mut session).await;

    if session.known_identities().contains(&admin) {
        session.switch_active_identity(admin).await?;
        println!("Switched to administrator {}", admin.short());

        let ids: Vec<u64> = session.records().iter().map(|r| r.id).collect();
        for (n, id) in ids.into_iter().enumerate() {
            // Every other case goes one step further
            for _ in 0..=(n % 2) {
                if let Err(e) = session.advance_to_next(id).await {
                    warn!(id, error = %e, "Status update failed");
                }
            }
        }
    }

    print_records(&session);

    if cli.watch {
        info!("Watching for wallet and contract events");
        session.run().await;
    }

    Ok(())
}

/// Apply events that are already queued without waiting for new ones.
async fn drain_events(session: &mut LedgerSession) {
    loop {
        let next = tokio::time::timeout(Duration::from_millis(50), session.next_event()).await;
        let Ok(Some(event)) = next else {
            break;
        };
        if let Err(e) = session.handle_event(event).await {
            warn!(error = %e, "Event handling failed");
        }
    }
}

fn print_records(session: &LedgerSession) {
    println!();
    println!("{:<4} {:<14} {:<13} {:<20} {:<15} DETAILS", "ID", "COMPLAINANT", "STATUS", "FILED", "CRIME TYPE");
    for record in session.records() {
        println!(
            "{:<4} {:<14} {:<13} {:<20} {:<15} {}",
            record.id,
            record.complainant.short(),
            record.status.as_str(),
            record.display_timestamp(),
            record.crime_type,
            record.details,
        );
    }

    let stats = session.stats();
    println!();
    println!(
        "Total: {}  Registered: {}  Investigating: {}  Closed: {}",
        stats.total, stats.registered, stats.active, stats.closed
    );
}
