//! JSON-RPC wallet provider over HTTP.
//!
//! Speaks the EIP-1193 request vocabulary (`eth_chainId`,
//! `eth_requestAccounts`, `eth_accounts`, `wallet_switchEthereumChain`) to
//! any endpoint that accepts JSON-RPC 2.0 POSTs, such as a local dev node
//! or a wallet bridge. HTTP has no push channel, so account and chain
//! notifications come from [`JsonRpcWallet::watch`], which polls.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::traits::*;
use crate::config::RpcConfig;
use crate::rpc::{RpcClient, RpcFailure};
use crate::types::{Address, ChainId};

/// HTTP JSON-RPC wallet provider.
pub struct JsonRpcWallet {
    rpc: RpcClient,
    events: broadcast::Sender<RawWalletEvent>,
}

impl JsonRpcWallet {
    /// Create a wallet client for the configured endpoint.
    pub fn new(config: &RpcConfig) -> Result<Self, ProviderError> {
        let rpc = RpcClient::new(config)?;
        let (events, _) = broadcast::channel(64);
        Ok(Self { rpc, events })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        self.rpc.url()
    }

    /// Accounts already exposed, without prompting
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let raw: Vec<String> = self.request("eth_accounts", serde_json::json!([]), None).await?;
        parse_accounts(&raw)
    }

    /// Start polling for account and chain changes.
    ///
    /// The first poll records the current answers without emitting. The
    /// task stops when the returned handle is dropped.
    pub fn watch(self: &Arc<Self>, interval: Duration) -> WatchHandle {
        let wallet = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<ChainId> = None;

            loop {
                ticker.tick().await;

                match wallet.accounts().await {
                    Ok(accounts) => {
                        if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                            debug!(count = accounts.len(), "Wallet accounts changed");
                            let _ = wallet.events.send(RawWalletEvent::accounts_changed(&accounts));
                        }
                        last_accounts = Some(accounts);
                    }
                    Err(e) => debug!(error = %e, "Account poll failed"),
                }

                match wallet.chain_id().await {
                    Ok(chain) => {
                        if last_chain.is_some_and(|prev| prev != chain) {
                            debug!(chain = %chain, "Wallet chain changed");
                            let _ = wallet.events.send(RawWalletEvent::chain_changed(chain));
                        }
                        last_chain = Some(chain);
                    }
                    Err(e) => debug!(error = %e, "Chain poll failed"),
                }
            }
        });

        WatchHandle { task }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        switch_target: Option<ChainId>,
    ) -> Result<T, ProviderError> {
        self.rpc.call(method, params).await.map_err(|e| match e {
            RpcFailure::Rpc { code, message } => {
                ProviderError::from_rpc(code, message, switch_target)
            }
            other => other.into(),
        })
    }
}

fn parse_accounts(raw: &[String]) -> Result<Vec<Address>, ProviderError> {
    raw.iter()
        .map(|s| {
            s.parse::<Address>()
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    fn id(&self) -> &str {
        self.rpc.url()
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        let raw: String = self.request("eth_chainId", serde_json::json!([]), None).await?;
        ChainId::from_hex(&raw).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn switch_chain(&self, chain: ChainId) -> Result<(), ProviderError> {
        let params = serde_json::json!([{ "chainId": chain.to_hex() }]);
        let _: serde_json::Value = self
            .request("wallet_switchEthereumChain", params, Some(chain))
            .await?;
        Ok(())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let raw: Vec<String> = self
            .request("eth_requestAccounts", serde_json::json!([]), None)
            .await?;
        parse_accounts(&raw)
    }

    fn subscribe(&self) -> broadcast::Receiver<RawWalletEvent> {
        self.events.subscribe()
    }
}

/// Handle to a running account/chain watcher; aborts the task on drop.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
