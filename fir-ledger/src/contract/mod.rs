//! Registry contract abstraction layer.
//!
//! - [`RegistryContract`] / [`ContractConnector`] traits and ABI types
//! - ABI encoding of the registry's calls and events
//! - JSON-RPC client for a deployed registry
//! - In-memory registry for tests and local simulation

pub mod abi;
pub mod json_rpc;
pub mod memory;
pub mod traits;

pub use json_rpc::{JsonRpcConnector, RpcRegistry};
pub use memory::{InMemoryRegistry, RegistryHandle};
pub use traits::{
    CaseData, CaseRegistered, ContractConnector, ContractError, RawLog, RegistryContract, TxHash,
    TxReceipt,
};
