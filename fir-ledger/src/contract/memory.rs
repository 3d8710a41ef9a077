//! In-memory registry ledger.
//!
//! Implements the registry ABI against local state so sessions can run
//! without a node: admin-only, forward-only status updates, one block per
//! transaction, and a `CaseRegistered` log per registration. Failure
//! toggles let tests exercise the read and write error paths.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use super::traits::*;
use crate::types::{Address, CaseStatus};

/// Shared in-memory ledger; clones refer to the same state.
#[derive(Clone)]
pub struct InMemoryRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    address: Address,
    state: Mutex<LedgerState>,
    logs: broadcast::Sender<RawLog>,
    fail_reads: AtomicBool,
    reject_writes: AtomicBool,
    fail_connect: AtomicBool,
    stall_receipts: AtomicBool,
}

struct LedgerState {
    admin: Address,
    cases: Vec<CaseData>,
    receipts: HashMap<TxHash, TxReceipt>,
    status_updates: Vec<(u64, u8)>,
    block: u64,
    nonce: u64,
    clock: u64,
}

impl InMemoryRegistry {
    /// Deploy a registry at `address` administered by `admin`.
    pub fn new(address: Address, admin: Address) -> Self {
        let (logs, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(RegistryInner {
                address,
                state: Mutex::new(LedgerState {
                    admin,
                    cases: Vec::new(),
                    receipts: HashMap::new(),
                    status_updates: Vec::new(),
                    block: 0,
                    nonce: 0,
                    clock: 1_700_000_000,
                }),
                logs,
                fail_reads: AtomicBool::new(false),
                reject_writes: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                stall_receipts: AtomicBool::new(false),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    /// Make every read fail, as an unreachable node would.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail, as a declined signature would.
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Make binding a handle fail, as an unreachable node would.
    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Never confirm transactions, as a congested network would.
    pub fn set_stall_receipts(&self, stall: bool) {
        self.inner.stall_receipts.store(stall, Ordering::SeqCst);
    }

    /// Set the timestamp assigned to the next case.
    pub fn set_clock(&self, secs: u64) {
        self.state().clock = secs;
    }

    /// Insert a case directly, without a transaction or log.
    pub fn seed_case(
        &self,
        complainant: Address,
        details: &str,
        crime_type: &str,
        status: CaseStatus,
    ) -> u64 {
        let mut state = self.state();
        let id = state.cases.len() as u64 + 1;
        let timestamp = state.tick();
        state.cases.push(CaseData {
            id,
            complainant,
            details: details.to_string(),
            crime_type: crime_type.to_string(),
            status_code: status.code(),
            timestamp,
        });
        id
    }

    /// Emit a log without touching state, as a lagging node might.
    pub fn emit_log(&self, log: RawLog) {
        let _ = self.inner.logs.send(log);
    }

    /// Every `updateCaseStatus` submitted, accepted or not
    pub fn status_updates(&self) -> Vec<(u64, u8)> {
        self.state().status_updates.clone()
    }

    /// Number of transactions mined
    pub fn transaction_count(&self) -> usize {
        self.state().receipts.len()
    }

    /// Number of attached log listeners
    pub fn listener_count(&self) -> usize {
        self.inner.logs.receiver_count()
    }

    /// Snapshot of stored cases, in creation order
    pub fn cases(&self) -> Vec<CaseData> {
        self.state().cases.clone()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // State is never left half-updated, so a poisoned lock is still usable
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerState {
    fn tick(&mut self) -> u64 {
        let now = self.clock;
        self.clock += 1;
        now
    }

    fn mine(&mut self, signer: Address, payload: &[u8]) -> TxHash {
        self.nonce += 1;
        self.block += 1;

        let mut hasher = Sha256::new();
        hasher.update(signer.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(payload);
        let hash = TxHash(hasher.finalize().into());

        self.receipts.insert(
            hash,
            TxReceipt {
                hash,
                block_number: self.block,
                success: true,
            },
        );
        hash
    }
}

#[async_trait]
impl ContractConnector for InMemoryRegistry {
    async fn connect(
        &self,
        address: Address,
        signer: Address,
    ) -> Result<Arc<dyn RegistryContract>, ContractError> {
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(ContractError::Transport("rpc down".into()));
        }
        Ok(Arc::new(RegistryHandle {
            registry: self.clone(),
            address,
            signer,
        }))
    }
}

/// Contract handle bound to one signer.
///
/// Binding succeeds for any address; calls fail with `NotDeployed` when
/// the address is not where the registry lives.
pub struct RegistryHandle {
    registry: InMemoryRegistry,
    address: Address,
    signer: Address,
}

impl RegistryHandle {
    fn check_read(&self) -> Result<(), ContractError> {
        if self.address != self.registry.inner.address {
            return Err(ContractError::NotDeployed(self.address));
        }
        if self.registry.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(ContractError::Transport("node unavailable".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), ContractError> {
        if self.address != self.registry.inner.address {
            return Err(ContractError::NotDeployed(self.address));
        }
        if self.registry.inner.reject_writes.load(Ordering::SeqCst) {
            return Err(ContractError::Rejected);
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryContract for RegistryHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn signer(&self) -> Address {
        self.signer
    }

    async fn admin(&self) -> Result<Address, ContractError> {
        self.check_read()?;
        Ok(self.registry.state().admin)
    }

    async fn case_count(&self) -> Result<u64, ContractError> {
        self.check_read()?;
        Ok(self.registry.state().cases.len() as u64)
    }

    async fn get_case(&self, index: u64) -> Result<CaseData, ContractError> {
        self.check_read()?;
        let state = self.registry.state();
        index
            .checked_sub(1)
            .and_then(|i| state.cases.get(i as usize))
            .cloned()
            .ok_or_else(|| ContractError::Reverted(format!("case {index} does not exist")))
    }

    async fn register_case(&self, details: &str, crime_type: &str) -> Result<TxHash, ContractError> {
        self.check_write()?;
        if details.is_empty() {
            return Err(ContractError::Reverted("details required".into()));
        }

        let (hash, event) = {
            let mut state = self.registry.state();
            let id = state.cases.len() as u64 + 1;
            let timestamp = state.tick();
            state.cases.push(CaseData {
                id,
                complainant: self.signer,
                details: details.to_string(),
                crime_type: crime_type.to_string(),
                status_code: CaseStatus::Registered.code(),
                timestamp,
            });

            let payload = format!("registerCase:{details}:{crime_type}");
            let hash = state.mine(self.signer, payload.as_bytes());
            let event = CaseRegistered {
                id,
                complainant: self.signer,
                crime_type: crime_type.to_string(),
                timestamp,
            };
            (hash, event)
        };

        debug!(id = event.id, tx = %hash, "Case registered");
        let _ = self.registry.inner.logs.send(event.to_raw());
        Ok(hash)
    }

    async fn update_case_status(&self, id: u64, status_code: u8) -> Result<TxHash, ContractError> {
        self.check_write()?;

        let mut state = self.registry.state();
        state.status_updates.push((id, status_code));

        if state.admin != self.signer {
            return Err(ContractError::Reverted("only admin".into()));
        }
        if CaseStatus::from_code(status_code).is_none() {
            return Err(ContractError::Reverted(format!("invalid status {status_code}")));
        }

        let index = id
            .checked_sub(1)
            .map(|i| i as usize)
            .filter(|i| *i < state.cases.len())
            .ok_or_else(|| ContractError::Reverted(format!("case {id} does not exist")))?;

        if status_code <= state.cases[index].status_code {
            return Err(ContractError::Reverted("status can only move forward".into()));
        }
        state.cases[index].status_code = status_code;

        let payload = format!("updateCaseStatus:{id}:{status_code}");
        Ok(state.mine(self.signer, payload.as_bytes()))
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<TxReceipt, ContractError> {
        if self.registry.inner.stall_receipts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.registry
            .state()
            .receipts
            .get(&tx)
            .cloned()
            .ok_or_else(|| ContractError::Transport(format!("unknown transaction {tx}")))
    }

    fn subscribe_logs(&self) -> broadcast::Receiver<RawLog> {
        self.registry.inner.logs.subscribe()
    }
}
