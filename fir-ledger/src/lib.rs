//! FIR Ledger - wallet session for an on-chain FIR registry
//!
//! Lets a citizen file First Information Reports against a registry
//! contract and lets the contract administrator move reports through
//! their lifecycle:
//! - Wallet providers behind a trait (JSON-RPC over HTTP, mock)
//! - Registry contract behind a trait (JSON-RPC node client, in-memory registry)
//! - One session object owning identity, privilege, records, and subscriptions
//! - Provisional records from creation events, replaced by the next reload
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             LedgerSession               │
//! │  (connect, register, advance, events)   │
//! └───────┬───────────────────────┬─────────┘
//!         ▼                       ▼
//! ┌────────────────┐     ┌──────────────────┐
//! │ WalletProvider │     │ RegistryContract │
//! │ (JSON-RPC/     │     │ (JSON-RPC/       │
//! │  mock)         │     │  in-memory)      │
//! └────────────────┘     └──────────────────┘
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod record;
pub mod rpc;
pub mod session;
pub mod types;
pub mod wallet;

// Re-export main types for convenience
pub use config::{LedgerConfig, RpcConfig};
pub use contract::{
    ContractConnector, InMemoryRegistry, JsonRpcConnector, RegistryContract, TxReceipt,
};
pub use error::{Result, SessionError};
pub use record::{Record, RecordStats};
pub use session::{LedgerSession, LoadState, NetworkStatus, SessionEvent};
pub use types::{Address, CaseStatus, ChainId};
pub use wallet::{JsonRpcWallet, MockWallet, WalletEvent, WalletProvider};
