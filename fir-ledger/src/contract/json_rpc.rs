//! Registry contract client over Ethereum JSON-RPC.
//!
//! Reads go through `eth_call`, writes through `eth_sendTransaction` from
//! the bound signer (the node or wallet bridge holds the keys), and
//! confirmations through `eth_getTransactionReceipt` polling. Creation
//! events come from an `eth_getLogs` poller that lives as long as the
//! handle.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::abi::{self, Token};
use super::traits::*;
use crate::config::RpcConfig;
use crate::rpc::RpcClient;
use crate::types::Address;

/// Connects registry handles through a JSON-RPC node.
pub struct JsonRpcConnector {
    rpc: Arc<RpcClient>,
    poll_interval: Duration,
}

impl JsonRpcConnector {
    pub fn new(config: &RpcConfig) -> Result<Self, ContractError> {
        Ok(Self {
            rpc: Arc::new(RpcClient::new(config)?),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }
}

#[async_trait]
impl ContractConnector for JsonRpcConnector {
    async fn connect(
        &self,
        address: Address,
        signer: Address,
    ) -> Result<Arc<dyn RegistryContract>, ContractError> {
        let code: String = self
            .rpc
            .call("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        if abi::from_hex(&code)?.is_empty() {
            return Err(ContractError::NotDeployed(address));
        }

        let (logs, _) = broadcast::channel(64);
        let poller = tokio::spawn(poll_logs(
            Arc::clone(&self.rpc),
            address,
            self.poll_interval,
            logs.clone(),
        ));

        debug!(contract = %address, signer = %signer, "Registry handle bound");

        Ok(Arc::new(RpcRegistry {
            rpc: Arc::clone(&self.rpc),
            address,
            signer,
            poll_interval: self.poll_interval,
            logs,
            poller,
        }))
    }
}

/// Registry handle bound to one signer; stops its log poller on drop.
pub struct RpcRegistry {
    rpc: Arc<RpcClient>,
    address: Address,
    signer: Address,
    poll_interval: Duration,
    logs: broadcast::Sender<RawLog>,
    poller: JoinHandle<()>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBody {
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogBody {
    #[serde(default)]
    topics: Vec<String>,
    data: String,
}

impl RpcRegistry {
    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, ContractError> {
        let params = json!([{ "to": self.address.to_string(), "data": abi::to_hex(&data) }, "latest"]);
        let raw: String = self.rpc.call("eth_call", params).await?;
        let bytes = abi::from_hex(&raw)?;
        if bytes.is_empty() {
            return Err(ContractError::NotDeployed(self.address));
        }
        Ok(bytes)
    }

    async fn send(&self, data: Vec<u8>) -> Result<TxHash, ContractError> {
        let params = json!([{
            "from": self.signer.to_string(),
            "to": self.address.to_string(),
            "data": abi::to_hex(&data),
        }]);
        let raw: String = self.rpc.call("eth_sendTransaction", params).await?;
        let bytes: [u8; 32] = abi::from_hex(&raw)?
            .try_into()
            .map_err(|_| ContractError::InvalidResponse(format!("bad transaction hash {raw}")))?;
        Ok(TxHash(bytes))
    }
}

#[async_trait]
impl RegistryContract for RpcRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn signer(&self) -> Address {
        self.signer
    }

    async fn admin(&self) -> Result<Address, ContractError> {
        let data = self.call(abi::encode_call(abi::ADMIN, &[])).await?;
        abi::Decoder::new(&data).address(0)
    }

    async fn case_count(&self) -> Result<u64, ContractError> {
        let data = self.call(abi::encode_call(abi::CASE_COUNT, &[])).await?;
        abi::Decoder::new(&data).uint(0)
    }

    async fn get_case(&self, index: u64) -> Result<CaseData, ContractError> {
        let data = self
            .call(abi::encode_call(abi::GET_CASE, &[Token::Uint(index)]))
            .await?;
        abi::decode_case(&data)
    }

    async fn register_case(&self, details: &str, crime_type: &str) -> Result<TxHash, ContractError> {
        self.send(abi::encode_call(
            abi::REGISTER_CASE,
            &[
                Token::String(details.to_string()),
                Token::String(crime_type.to_string()),
            ],
        ))
        .await
    }

    async fn update_case_status(&self, id: u64, status_code: u8) -> Result<TxHash, ContractError> {
        self.send(abi::encode_call(
            abi::UPDATE_CASE_STATUS,
            &[Token::Uint(id), Token::Uint(u64::from(status_code))],
        ))
        .await
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<TxReceipt, ContractError> {
        loop {
            let receipt: Option<ReceiptBody> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([tx.to_string()]))
                .await?;

            if let Some(ReceiptBody {
                block_number: Some(block),
                status,
            }) = receipt
            {
                return Ok(TxReceipt {
                    hash: tx,
                    block_number: abi::quantity(&block)?,
                    success: status.as_deref().map(abi::quantity).transpose()? == Some(1),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn subscribe_logs(&self) -> broadcast::Receiver<RawLog> {
        self.logs.subscribe()
    }
}

impl Drop for RpcRegistry {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

/// Poll for `CaseRegistered` logs in blocks mined after the first poll.
async fn poll_logs(
    rpc: Arc<RpcClient>,
    address: Address,
    interval: Duration,
    logs: broadcast::Sender<RawLog>,
) {
    let topic = abi::to_hex(&abi::event_topic(abi::CASE_REGISTERED));
    let mut ticker = tokio::time::interval(interval);
    let mut from_block: Option<u64> = None;

    loop {
        ticker.tick().await;

        let head = match rpc.call::<String>("eth_blockNumber", json!([])).await {
            Ok(raw) => match abi::quantity(&raw) {
                Ok(head) => head,
                Err(e) => {
                    debug!(error = %e, "Unreadable block number");
                    continue;
                }
            },
            Err(e) => {
                debug!(error = %e, "Block number poll failed");
                continue;
            }
        };

        let from = match from_block {
            Some(from) if from <= head => from,
            Some(_) => continue,
            None => {
                from_block = Some(head + 1);
                continue;
            }
        };

        let filter = json!([{
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{head:#x}"),
            "address": address.to_string(),
            "topics": [topic],
        }]);

        let entries: Vec<LogBody> = match rpc.call("eth_getLogs", filter).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Log poll failed");
                continue;
            }
        };

        for entry in entries {
            if entry.topics.first().is_some_and(|t| !t.eq_ignore_ascii_case(&topic)) {
                continue;
            }
            match abi::from_hex(&entry.data).and_then(|data| abi::decode_case_registered(&data)) {
                Ok(event) => {
                    let _ = logs.send(event.to_raw());
                }
                Err(e) => warn!(error = %e, "Dropping undecodable CaseRegistered log"),
            }
        }

        from_block = Some(head + 1);
    }
}
