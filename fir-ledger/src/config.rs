//! Configuration for a ledger session.

use serde::{Deserialize, Serialize};

use crate::types::{Address, ChainId};

/// Address of the deployed FIR registry contract on Sepolia
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x7a6DE621cAc809A1A850F091a2e4eDac33054Ea6";

/// Description used for records synthesized from creation events
pub const DEFAULT_PLACEHOLDER: &str = "New FIR Registered";

/// Configuration for a [`LedgerSession`](crate::LedgerSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Registry contract address
    #[serde(default = "default_contract_address")]
    pub contract_address: Address,
    /// Chain the registry lives on
    #[serde(default = "default_chain_id")]
    pub chain_id: ChainId,
    /// Crime types offered when filing a report
    #[serde(default = "default_crime_types")]
    pub crime_types: Vec<String>,
    /// Details text for provisional records
    #[serde(default = "default_placeholder")]
    pub placeholder_details: String,
    /// JSON-RPC wallet transport
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            chain_id: default_chain_id(),
            crime_types: default_crime_types(),
            placeholder_details: default_placeholder(),
            rpc: RpcConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load config from a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Whether the category is one of the configured presets (case-insensitive)
    pub fn is_known_crime_type(&self, crime_type: &str) -> bool {
        self.crime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(crime_type.trim()))
    }
}

/// HTTP transport settings for [`JsonRpcWallet`](crate::wallet::JsonRpcWallet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Polling interval of the account/chain watcher in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_contract_address() -> Address {
    // Compile-time constant, parsing cannot fail
    DEFAULT_CONTRACT_ADDRESS.parse().unwrap_or(Address::ZERO)
}
fn default_chain_id() -> ChainId { ChainId::SEPOLIA }
fn default_placeholder() -> String { DEFAULT_PLACEHOLDER.to_string() }
fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 1000 }

fn default_crime_types() -> Vec<String> {
    ["Theft", "Fraud", "Assault", "Cyber Crime"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
