//! Error types for the FIR ledger session

use thiserror::Error;

use crate::types::{CaseStatus, ChainId};

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session error types
///
/// Read failures never reach callers of the session; they degrade state to
/// an empty, unprivileged view. Everything else is returned to the action
/// that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No wallet provider is available
    #[error("No wallet provider detected, install a wallet extension to continue")]
    ProviderMissing,

    /// Connection or signature request was declined
    #[error("Request rejected by the wallet user")]
    UserRejected,

    /// Provider answered with an error other than a rejection
    #[error("Wallet provider error: {0}")]
    Provider(String),

    /// Active chain does not match the registry network
    #[error("Wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },

    /// A contract read failed
    #[error("Contract read failed: {0}")]
    ReadFailure(String),

    /// A contract write failed for any reason
    #[error("Transaction failed")]
    TransactionFailed,

    /// Required input was empty or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Status name is not part of the status table
    #[error("Unknown status: {0}")]
    InvalidStatus(String),

    /// Requested status does not move the record forward
    #[error("Case #{id} is already {current}, cannot move to {target}")]
    StatusRegression {
        id: u64,
        current: CaseStatus,
        target: CaseStatus,
    },

    /// No identity is bound yet
    #[error("Wallet not connected")]
    NotConnected,

    /// Operation requires the administrator identity
    #[error("Administrator access required")]
    NotPrivileged,

    /// Address is not among the accounts exposed by the wallet
    #[error("Account {0} is not exposed by the wallet")]
    UnknownIdentity(String),

    /// An event payload did not have the expected shape
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

impl From<crate::wallet::ProviderError> for SessionError {
    fn from(err: crate::wallet::ProviderError) -> Self {
        use crate::wallet::ProviderError;
        match err {
            ProviderError::Unavailable(_) => SessionError::ProviderMissing,
            ProviderError::UserRejected => SessionError::UserRejected,
            other => SessionError::Provider(other.to_string()),
        }
    }
}

impl From<crate::contract::ContractError> for SessionError {
    fn from(err: crate::contract::ContractError) -> Self {
        SessionError::ReadFailure(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidPayload(err.to_string())
    }
}
