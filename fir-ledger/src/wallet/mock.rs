//! Mock wallet provider for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::traits::*;
use crate::types::{Address, ChainId};

/// Mock wallet provider.
///
/// Holds a chain and an account list that tests can change, records how
/// often each request was made, and can be told to decline prompts.
pub struct MockWallet {
    id: String,
    chain: AtomicU64,
    accounts: Mutex<Vec<Address>>,
    reject_accounts: AtomicBool,
    reject_switch: AtomicBool,
    switch_calls: AtomicU32,
    account_requests: AtomicU32,
    events: broadcast::Sender<RawWalletEvent>,
}

impl MockWallet {
    /// Create a mock wallet on the given chain exposing the given accounts.
    pub fn new(chain: ChainId, accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            id: "mock-wallet".to_string(),
            chain: AtomicU64::new(chain.0),
            accounts: Mutex::new(accounts),
            reject_accounts: AtomicBool::new(false),
            reject_switch: AtomicBool::new(false),
            switch_calls: AtomicU32::new(0),
            account_requests: AtomicU32::new(0),
            events,
        }
    }

    /// Decline account access prompts.
    pub fn with_rejected_accounts(self, reject: bool) -> Self {
        self.reject_accounts.store(reject, Ordering::SeqCst);
        self
    }

    /// Decline chain switch prompts.
    pub fn with_rejected_switch(self, reject: bool) -> Self {
        self.reject_switch.store(reject, Ordering::SeqCst);
        self
    }

    /// Number of chain switch requests received.
    pub fn switch_calls(&self) -> u32 {
        self.switch_calls.load(Ordering::SeqCst)
    }

    /// Number of account access prompts received.
    pub fn account_requests(&self) -> u32 {
        self.account_requests.load(Ordering::SeqCst)
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Change the exposed accounts and notify listeners, as a user would
    /// by switching accounts in the extension.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        if let Ok(mut guard) = self.accounts.lock() {
            *guard = accounts.clone();
        }
        let _ = self.events.send(RawWalletEvent::accounts_changed(&accounts));
    }

    /// Change the active chain and notify listeners.
    pub fn set_chain(&self, chain: ChainId) {
        self.chain.store(chain.0, Ordering::SeqCst);
        let _ = self.events.send(RawWalletEvent::chain_changed(chain));
    }

    /// Push an arbitrary raw notification, including malformed ones.
    pub fn emit_raw(&self, event: RawWalletEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        Ok(ChainId(self.chain.load(Ordering::SeqCst)))
    }

    async fn switch_chain(&self, chain: ChainId) -> Result<(), ProviderError> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);

        if self.reject_switch.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected);
        }

        self.set_chain(chain);
        Ok(())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.account_requests.fetch_add(1, Ordering::SeqCst);

        if self.reject_accounts.load(Ordering::SeqCst) {
            return Err(ProviderError::UserRejected);
        }

        self.accounts
            .lock()
            .map(|a| a.clone())
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<RawWalletEvent> {
        self.events.subscribe()
    }
}
