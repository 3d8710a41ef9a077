//! Core traits for the FIR registry contract.
//!
//! The contract is an external program with a fixed ABI:
//!
//! ```text
//! function admin() view returns (address)
//! function caseCount() view returns (uint256)
//! function getCase(uint256) view returns (uint256, address, string, string, uint8, uint256)
//! function registerCase(string, string)
//! function updateCaseStatus(uint256, uint8)
//! event CaseRegistered(uint256 id, address complainant, string crimeType, uint256 timestamp)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::rpc::RpcFailure;
use crate::types::Address;

/// Error types for contract calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// No contract code at the bound address
    #[error("No contract deployed at {0}")]
    NotDeployed(Address),

    /// Call reverted
    #[error("Execution reverted: {0}")]
    Reverted(String),

    /// Signer declined the transaction
    #[error("Transaction rejected by signer")]
    Rejected,

    /// Transport or node failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Node answered with data that does not match the ABI
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// EIP-1193 code for a transaction the signer declined
const SIGNER_REJECTED_CODE: i64 = 4001;

/// Node error code for a reverted call
const EXECUTION_REVERTED_CODE: i64 = 3;

impl From<RpcFailure> for ContractError {
    fn from(err: RpcFailure) -> Self {
        match err {
            RpcFailure::Rpc {
                code: SIGNER_REJECTED_CODE,
                ..
            } => Self::Rejected,
            RpcFailure::Rpc { code, message }
                if code == EXECUTION_REVERTED_CODE || message.contains("revert") =>
            {
                Self::Reverted(message)
            }
            RpcFailure::InvalidResponse(msg) => Self::InvalidResponse(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// One `getCase` answer, as the contract returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseData {
    pub id: u64,
    pub complainant: Address,
    pub details: String,
    pub crime_type: String,
    pub status_code: u8,
    /// Seconds since epoch
    pub timestamp: u64,
}

/// Transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Confirmation of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
    /// False when the transaction was mined but reverted
    pub success: bool,
}

/// Event log as delivered by the node, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    /// Event name
    pub event: String,
    /// Positional event arguments
    pub args: Vec<serde_json::Value>,
}

/// Validated `CaseRegistered` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRegistered {
    pub id: u64,
    pub complainant: Address,
    pub crime_type: String,
    pub timestamp: u64,
}

impl CaseRegistered {
    pub const EVENT_NAME: &'static str = "CaseRegistered";

    /// Encode as a raw log, the way a node would deliver it
    pub fn to_raw(&self) -> RawLog {
        RawLog {
            event: Self::EVENT_NAME.to_string(),
            args: vec![
                serde_json::json!(self.id),
                serde_json::json!(self.complainant.to_string()),
                serde_json::json!(self.crime_type),
                serde_json::json!(self.timestamp),
            ],
        }
    }
}

impl TryFrom<RawLog> for CaseRegistered {
    type Error = SessionError;

    fn try_from(raw: RawLog) -> Result<Self, Self::Error> {
        if raw.event != Self::EVENT_NAME {
            return Err(SessionError::InvalidPayload(format!(
                "unexpected event {}",
                raw.event
            )));
        }

        let [id, complainant, crime_type, timestamp]: [serde_json::Value; 4] =
            raw.args.try_into().map_err(|args: Vec<_>| {
                SessionError::InvalidPayload(format!(
                    "CaseRegistered expects 4 arguments, got {}",
                    args.len()
                ))
            })?;

        let complainant: String = serde_json::from_value(complainant)?;

        Ok(Self {
            id: uint_arg("id", &id)?,
            complainant: complainant
                .parse()
                .map_err(|e: SessionError| SessionError::InvalidPayload(e.to_string()))?,
            crime_type: serde_json::from_value(crime_type)?,
            timestamp: uint_arg("timestamp", &timestamp)?,
        })
    }
}

/// uint256 arguments arrive either as JSON numbers or decimal/hex strings
fn uint_arg(name: &str, value: &serde_json::Value) -> Result<u64, SessionError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => match s.strip_prefix("0x") {
            Some(digits) => u64::from_str_radix(digits, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    };
    parsed.ok_or_else(|| SessionError::InvalidPayload(format!("argument {name} is not a uint: {value}")))
}

/// Typed handle to the registry contract, bound to a signing identity.
#[async_trait]
pub trait RegistryContract: Send + Sync {
    /// Contract address
    fn address(&self) -> Address;

    /// Identity that signs writes through this handle
    fn signer(&self) -> Address;

    /// Designated administrator
    async fn admin(&self) -> Result<Address, ContractError>;

    /// Number of cases ever registered
    async fn case_count(&self) -> Result<u64, ContractError>;

    /// Case by 1-based index
    async fn get_case(&self, index: u64) -> Result<CaseData, ContractError>;

    /// Submit `registerCase`
    async fn register_case(&self, details: &str, crime_type: &str) -> Result<TxHash, ContractError>;

    /// Submit `updateCaseStatus`
    async fn update_case_status(&self, id: u64, status_code: u8) -> Result<TxHash, ContractError>;

    /// Wait for one confirmation of a submitted transaction
    async fn wait_for_receipt(&self, tx: TxHash) -> Result<TxReceipt, ContractError>;

    /// Subscribe to contract event logs.
    ///
    /// Dropping the receiver detaches the listener.
    fn subscribe_logs(&self) -> broadcast::Receiver<RawLog>;
}

/// Produces contract handles bound to a signer.
#[async_trait]
pub trait ContractConnector: Send + Sync {
    async fn connect(
        &self,
        address: Address,
        signer: Address,
    ) -> Result<Arc<dyn RegistryContract>, ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_registered_from_raw() {
        let event = CaseRegistered {
            id: 7,
            complainant: Address::from_bytes([0xab; 20]),
            crime_type: "Fraud".into(),
            timestamp: 1_700_000_000,
        };
        assert_eq!(CaseRegistered::try_from(event.to_raw()).unwrap(), event);
    }

    #[test]
    fn test_uint_args_as_strings() {
        let raw = RawLog {
            event: "CaseRegistered".into(),
            args: vec![
                json!("0x7"),
                json!("0xabababababababababababababababababababab"),
                json!("Theft"),
                json!("1700000000"),
            ],
        };
        let event = CaseRegistered::try_from(raw).unwrap();
        assert_eq!(event.id, 7);
        assert_eq!(event.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_malformed_logs_rejected() {
        let wrong_name = RawLog {
            event: "CaseUpdated".into(),
            args: vec![],
        };
        let short = RawLog {
            event: "CaseRegistered".into(),
            args: vec![json!(1), json!("0x00")],
        };
        let bad_id = RawLog {
            event: "CaseRegistered".into(),
            args: vec![
                json!(-1),
                json!("0xabababababababababababababababababababab"),
                json!("Theft"),
                json!(0),
            ],
        };

        for raw in [wrong_name, short, bad_id] {
            assert!(matches!(
                CaseRegistered::try_from(raw),
                Err(SessionError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn test_node_error_classification() {
        let rpc = |code: i64, message: &str| RpcFailure::Rpc {
            code,
            message: message.into(),
        };
        assert_eq!(
            ContractError::from(rpc(4001, "User denied transaction signature")),
            ContractError::Rejected
        );
        assert_eq!(
            ContractError::from(rpc(3, "execution reverted: Only admin")),
            ContractError::Reverted("execution reverted: Only admin".into())
        );
        assert_eq!(
            ContractError::from(rpc(-32000, "VM Exception: revert")),
            ContractError::Reverted("VM Exception: revert".into())
        );
        assert!(matches!(
            ContractError::from(RpcFailure::Transport("timed out".into())),
            ContractError::Transport(_)
        ));
    }

    #[test]
    fn test_tx_hash_display() {
        let hash = TxHash([0x11; 32]);
        assert_eq!(hash.to_string().len(), 66);
        assert!(hash.to_string().starts_with("0x1111"));
    }
}
