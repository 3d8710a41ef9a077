//! Core trait for wallet providers.
//!
//! A wallet provider brokers account access and chain selection. Its
//! notifications arrive as untyped payloads and are validated into
//! [`WalletEvent`] before the session sees them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::rpc::RpcFailure;
use crate::types::{Address, ChainId};

/// EIP-1193 code for a request the user declined
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 code for a chain the wallet does not know
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Error types for wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider cannot be reached at all
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// User declined the request
    #[error("User rejected the request")]
    UserRejected,

    /// Chain switch target is not configured in the wallet
    #[error("Unrecognized chain {0}")]
    UnrecognizedChain(ChainId),

    /// Request reached the provider but did not complete
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// Provider answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Answer could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a JSON-RPC error object
    pub fn from_rpc(code: i64, message: impl Into<String>, chain: Option<ChainId>) -> Self {
        match (code, chain) {
            (USER_REJECTED_CODE, _) => Self::UserRejected,
            (UNRECOGNIZED_CHAIN_CODE, Some(chain)) => Self::UnrecognizedChain(chain),
            _ => Self::Rpc {
                code,
                message: message.into(),
            },
        }
    }
}

impl From<RpcFailure> for ProviderError {
    fn from(err: RpcFailure) -> Self {
        match err {
            RpcFailure::Client(msg) | RpcFailure::Unreachable(msg) => Self::Unavailable(msg),
            RpcFailure::Transport(msg) => Self::Transport(msg),
            RpcFailure::Http { status, body } => Self::Rpc {
                code: i64::from(status),
                message: body,
            },
            RpcFailure::Rpc { code, message } => Self::from_rpc(code, message, None),
            RpcFailure::InvalidResponse(msg) => Self::InvalidResponse(msg),
        }
    }
}

/// Notification as delivered by the provider, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWalletEvent {
    /// Event name, `accountsChanged` or `chainChanged`
    pub kind: String,
    /// Event argument
    pub payload: serde_json::Value,
}

impl RawWalletEvent {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn accounts_changed(accounts: &[Address]) -> Self {
        Self::new(
            "accountsChanged",
            serde_json::Value::Array(
                accounts
                    .iter()
                    .map(|a| serde_json::Value::String(a.to_string()))
                    .collect(),
            ),
        )
    }

    pub fn chain_changed(chain: ChainId) -> Self {
        Self::new("chainChanged", serde_json::Value::String(chain.to_hex()))
    }
}

/// Validated wallet notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Exposed accounts changed; empty means the wallet disconnected
    AccountsChanged(Vec<Address>),
    /// Active chain changed
    ChainChanged(ChainId),
}

impl TryFrom<RawWalletEvent> for WalletEvent {
    type Error = SessionError;

    fn try_from(raw: RawWalletEvent) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "accountsChanged" => {
                let items: Vec<String> = serde_json::from_value(raw.payload)?;
                let accounts = items
                    .iter()
                    .map(|s| s.parse::<Address>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| SessionError::InvalidPayload(e.to_string()))?;
                Ok(Self::AccountsChanged(accounts))
            }
            "chainChanged" => {
                let chain = match &raw.payload {
                    serde_json::Value::String(s) => ChainId::from_hex(s)
                        .map_err(|e| SessionError::InvalidPayload(e.to_string()))?,
                    serde_json::Value::Number(n) => n.as_u64().map(ChainId).ok_or_else(|| {
                        SessionError::InvalidPayload(format!("chain id {n} is not a u64"))
                    })?,
                    other => {
                        return Err(SessionError::InvalidPayload(format!(
                            "chainChanged payload must be a hex string, got {other}"
                        )))
                    }
                };
                Ok(Self::ChainChanged(chain))
            }
            other => Err(SessionError::InvalidPayload(format!(
                "unknown wallet event {other}"
            ))),
        }
    }
}

/// Core trait for wallet providers.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Provider identifier, for logging
    fn id(&self) -> &str;

    /// Currently selected chain
    async fn chain_id(&self) -> Result<ChainId, ProviderError>;

    /// Ask the wallet to switch chains
    async fn switch_chain(&self, chain: ChainId) -> Result<(), ProviderError>;

    /// Prompt for account access; returns exposed accounts, active first
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Subscribe to account and chain notifications.
    ///
    /// Dropping the receiver detaches the listener.
    fn subscribe(&self) -> broadcast::Receiver<RawWalletEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accounts_changed_validation() {
        let raw = RawWalletEvent::new(
            "accountsChanged",
            json!(["0x7A6DE621CAC809A1A850F091A2E4EDAC33054EA6"]),
        );
        let event = WalletEvent::try_from(raw).unwrap();
        let WalletEvent::AccountsChanged(accounts) = event else {
            panic!("expected accounts event");
        };
        assert_eq!(accounts.len(), 1);

        let empty = WalletEvent::try_from(RawWalletEvent::new("accountsChanged", json!([]))).unwrap();
        assert_eq!(empty, WalletEvent::AccountsChanged(vec![]));
    }

    #[test]
    fn test_chain_changed_validation() {
        let event = WalletEvent::try_from(RawWalletEvent::chain_changed(ChainId::SEPOLIA)).unwrap();
        assert_eq!(event, WalletEvent::ChainChanged(ChainId::SEPOLIA));

        let numeric = WalletEvent::try_from(RawWalletEvent::new("chainChanged", json!(5))).unwrap();
        assert_eq!(numeric, WalletEvent::ChainChanged(ChainId::GOERLI));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        for raw in [
            RawWalletEvent::new("accountsChanged", json!("0xabc")),
            RawWalletEvent::new("accountsChanged", json!(["not-an-address"])),
            RawWalletEvent::new("chainChanged", json!({"id": 1})),
            RawWalletEvent::new("disconnect", json!(null)),
        ] {
            assert!(matches!(
                WalletEvent::try_from(raw),
                Err(SessionError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn test_rpc_error_classification() {
        assert_eq!(
            ProviderError::from_rpc(4001, "User denied", None),
            ProviderError::UserRejected
        );
        assert_eq!(
            ProviderError::from_rpc(4902, "Unrecognized chain", Some(ChainId(31337))),
            ProviderError::UnrecognizedChain(ChainId(31337))
        );
        assert!(matches!(
            ProviderError::from_rpc(-32603, "Internal", None),
            ProviderError::Rpc { code: -32603, .. }
        ));
    }

    #[test]
    fn test_transport_failures_stay_provider_errors() {
        assert!(matches!(
            ProviderError::from(RpcFailure::Unreachable("refused".into())),
            ProviderError::Unavailable(_)
        ));
        let timed_out = ProviderError::from(RpcFailure::Transport("timed out".into()));
        assert_eq!(timed_out, ProviderError::Transport("timed out".into()));
        assert!(matches!(
            SessionError::from(timed_out),
            SessionError::Provider(_)
        ));
    }
}
