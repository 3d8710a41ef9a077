//! External event subscriptions.
//!
//! Holds at most one wallet receiver and one contract log receiver.
//! Replacing or detaching a receiver drops it, which unsubscribes.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::contract::{CaseRegistered, RawLog};
use crate::wallet::{RawWalletEvent, WalletEvent};

/// Validated event ready for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Wallet(WalletEvent),
    /// Creation event, tagged with the epoch of the subscription that delivered it
    CaseRegistered { epoch: u64, event: CaseRegistered },
}

struct ContractSubscription {
    epoch: u64,
    rx: broadcast::Receiver<RawLog>,
}

enum Received {
    Wallet(Result<RawWalletEvent, RecvError>),
    Contract(Result<RawLog, RecvError>),
}

/// Live subscriptions of a session
#[derive(Default)]
pub struct EventSubscriptions {
    wallet: Option<broadcast::Receiver<RawWalletEvent>>,
    contract: Option<ContractSubscription>,
}

impl EventSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_wallet(&mut self, rx: broadcast::Receiver<RawWalletEvent>) {
        self.wallet = Some(rx);
    }

    pub fn detach_wallet(&mut self) {
        self.wallet = None;
    }

    /// Replace the contract subscription with one bound in `epoch`
    pub fn attach_contract(&mut self, epoch: u64, rx: broadcast::Receiver<RawLog>) {
        self.contract = Some(ContractSubscription { epoch, rx });
    }

    pub fn detach_contract(&mut self) {
        self.contract = None;
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn has_contract(&self) -> bool {
        self.contract.is_some()
    }

    /// Wait for the next valid event.
    ///
    /// Malformed payloads are logged and skipped. A closed source is
    /// detached. Returns `None` once nothing is attached.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            if self.wallet.is_none() && self.contract.is_none() {
                return None;
            }

            let received = tokio::select! {
                biased;
                r = recv_or_pending(self.wallet.as_mut()) => Received::Wallet(r),
                r = recv_or_pending(self.contract.as_mut().map(|c| &mut c.rx)) => Received::Contract(r),
            };

            match received {
                Received::Wallet(Ok(raw)) => match WalletEvent::try_from(raw) {
                    Ok(event) => return Some(SessionEvent::Wallet(event)),
                    Err(e) => warn!(error = %e, "Ignoring wallet notification"),
                },
                Received::Contract(Ok(raw)) => {
                    if raw.event != CaseRegistered::EVENT_NAME {
                        debug!(event = %raw.event, "Ignoring contract event");
                        continue;
                    }
                    match CaseRegistered::try_from(raw) {
                        Ok(event) => {
                            let epoch = self.contract.as_ref().map(|c| c.epoch).unwrap_or_default();
                            return Some(SessionEvent::CaseRegistered { epoch, event });
                        }
                        Err(e) => warn!(error = %e, "Ignoring contract log"),
                    }
                }
                Received::Wallet(Err(RecvError::Lagged(n)))
                | Received::Contract(Err(RecvError::Lagged(n))) => {
                    warn!(skipped = n, "Event listener lagged");
                }
                Received::Wallet(Err(RecvError::Closed)) => {
                    debug!("Wallet event source closed");
                    self.wallet = None;
                }
                Received::Contract(Err(RecvError::Closed)) => {
                    debug!("Contract event source closed");
                    self.contract = None;
                }
            }
        }
    }
}

async fn recv_or_pending<T: Clone>(rx: Option<&mut broadcast::Receiver<T>>) -> Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
