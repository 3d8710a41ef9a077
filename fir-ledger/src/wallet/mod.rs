//! Wallet provider abstraction layer.
//!
//! - [`WalletProvider`] trait and event payloads
//! - HTTP JSON-RPC provider
//! - Mock provider for testing

pub mod json_rpc;
pub mod mock;
pub mod traits;

pub use json_rpc::{JsonRpcWallet, WatchHandle};
pub use mock::MockWallet;
pub use traits::{ProviderError, RawWalletEvent, WalletEvent, WalletProvider};
