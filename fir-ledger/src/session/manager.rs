//! LedgerSession - single owner of wallet, contract, and record state.
//!
//! All state changes go through `&mut self`, so a session is driven from
//! one task. Writes wait for confirmation and then reload; external
//! events are pulled with [`LedgerSession::next_event`] and applied with
//! [`LedgerSession::handle_event`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::listener::{EventSubscriptions, SessionEvent};
use super::network::NetworkStatus;
use super::snapshot::{LoadState, RecordSnapshot};
use super::sync::{is_privileged, load_all};
use crate::config::LedgerConfig;
use crate::contract::{CaseRegistered, ContractConnector, ContractError, RegistryContract, TxHash, TxReceipt};
use crate::error::{Result, SessionError};
use crate::record::{Record, RecordStats};
use crate::types::{Address, CaseStatus};
use crate::wallet::{WalletEvent, WalletProvider};

/// Active identity bound to a contract handle.
pub struct Binding {
    identity: Address,
    contract: Arc<dyn RegistryContract>,
    privileged: bool,
    epoch: u64,
}

impl Binding {
    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn contract(&self) -> &Arc<dyn RegistryContract> {
        &self.contract
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Wallet and contract session for the FIR registry.
///
/// # Example
///
/// ```rust,ignore
/// use fir_ledger::{LedgerConfig, LedgerSession};
///
/// let mut session = LedgerSession::new(LedgerConfig::default(), Some(wallet), connector);
/// let accounts = session.connect().await?;
///
/// session.register("Phone stolen at market", "Theft").await?;
/// for record in session.records() {
///     println!("#{} {} {}", record.id, record.status, record.details);
/// }
///
/// while let Some(event) = session.next_event().await {
///     session.handle_event(event).await?;
/// }
/// ```
pub struct LedgerSession {
    config: LedgerConfig,
    wallet: Option<Arc<dyn WalletProvider>>,
    connector: Arc<dyn ContractConnector>,
    known: Vec<Address>,
    binding: Option<Binding>,
    snapshot: RecordSnapshot,
    network: NetworkStatus,
    subscriptions: EventSubscriptions,
    busy: Arc<AtomicBool>,
}

/// Holds the busy flag raised until dropped
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LedgerSession {
    /// Create a session. `wallet` is `None` when no provider is installed.
    pub fn new(
        config: LedgerConfig,
        wallet: Option<Arc<dyn WalletProvider>>,
        connector: Arc<dyn ContractConnector>,
    ) -> Self {
        let network = NetworkStatus::unknown(wallet.is_some());
        Self {
            config,
            wallet,
            connector,
            known: Vec::new(),
            binding: None,
            snapshot: RecordSnapshot::new(),
            network,
            subscriptions: EventSubscriptions::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    // === Accessors ===

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_some()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn active_identity(&self) -> Option<Address> {
        self.binding.as_ref().map(|b| b.identity)
    }

    /// Accounts exposed by the wallet, available for switching
    pub fn known_identities(&self) -> &[Address] {
        &self.known
    }

    pub fn is_privileged(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.privileged)
    }

    /// Records, most recent first
    pub fn records(&self) -> &[Record] {
        self.snapshot.records()
    }

    pub fn record(&self, id: u64) -> Option<&Record> {
        self.snapshot.get(id)
    }

    pub fn load_state(&self) -> LoadState {
        self.snapshot.state()
    }

    /// Reason of the last failed load
    pub fn load_failure(&self) -> Option<&str> {
        self.snapshot.failure()
    }

    pub fn stats(&self) -> RecordStats {
        self.snapshot.stats()
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    /// True while a transaction is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Shared busy flag, readable from other tasks while a write is awaited
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    /// Current binding epoch
    pub fn epoch(&self) -> u64 {
        self.snapshot.epoch()
    }

    // === Identity & binding ===

    /// Ask the wallet for the current chain and update the network status.
    pub async fn refresh_network(&mut self) -> &NetworkStatus {
        match &self.wallet {
            None => self.network = NetworkStatus::unknown(false),
            Some(wallet) => match wallet.chain_id().await {
                Ok(chain) => self.network = NetworkStatus::evaluate(chain, self.config.chain_id),
                Err(e) => warn!(error = %e, "Chain lookup failed"),
            },
        }
        &self.network
    }

    /// Connect to the wallet and bind the first exposed account.
    ///
    /// Switches the wallet to the registry chain first if needed, then
    /// prompts for accounts. Returns every exposed account, active first.
    pub async fn connect(&mut self) -> Result<Vec<Address>> {
        let wallet = self.wallet.clone().ok_or(SessionError::ProviderMissing)?;
        let target = self.config.chain_id;
        info!(provider = wallet.id(), target = %target, "Connecting wallet");

        let chain = wallet.chain_id().await?;
        self.network = NetworkStatus::evaluate(chain, target);

        if chain != target {
            info!(current = %chain, target = %target, "Requesting chain switch");
            if let Err(e) = wallet.switch_chain(target).await {
                warn!(error = %e, "Chain switch failed");
                return Err(SessionError::WrongNetwork {
                    expected: target,
                    actual: chain,
                });
            }

            let switched = wallet.chain_id().await?;
            self.network = NetworkStatus::evaluate(switched, target);
            if switched != target {
                return Err(SessionError::WrongNetwork {
                    expected: target,
                    actual: switched,
                });
            }
        }

        let accounts = wallet.request_accounts().await?;
        let first = *accounts.first().ok_or(SessionError::UserRejected)?;

        if !self.subscriptions.has_wallet() {
            self.subscriptions.attach_wallet(wallet.subscribe());
        }

        self.bind(first, accounts.clone()).await?;
        info!(account = %first, accounts = accounts.len(), "Wallet connected");
        Ok(accounts)
    }

    /// Rebind to another already-exposed account without prompting.
    pub async fn switch_active_identity(&mut self, address: Address) -> Result<()> {
        if !self.known.contains(&address) {
            return Err(SessionError::UnknownIdentity(address.to_string()));
        }
        let known = self.known.clone();
        self.bind(address, known).await
    }

    /// Tear down the session, including the wallet listener.
    pub fn disconnect(&mut self) {
        self.clear_session();
        self.subscriptions.detach_wallet();
        info!("Session disconnected");
    }

    /// Replace the binding with one for `identity`.
    ///
    /// The previous binding is torn down first; if the connector fails the
    /// session ends up cleared, never holding the old identity's state.
    async fn bind(&mut self, identity: Address, known: Vec<Address>) -> Result<()> {
        self.binding = None;
        self.subscriptions.detach_contract();
        self.snapshot.advance_epoch();

        let contract = match self
            .connector
            .connect(self.config.contract_address, identity)
            .await
        {
            Ok(contract) => contract,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Contract binding failed, clearing session");
                self.clear_session();
                return Err(SessionError::ReadFailure(e.to_string()));
            }
        };

        self.known = known;
        let epoch = self.snapshot.advance_epoch();
        self.subscriptions.attach_contract(epoch, contract.subscribe_logs());

        let privileged = is_privileged(&*contract, identity).await;
        debug!(identity = %identity, privileged, epoch, "Session bound");

        self.binding = Some(Binding {
            identity,
            contract,
            privileged,
            epoch,
        });

        self.reload().await;
        Ok(())
    }

    fn clear_session(&mut self) {
        self.binding = None;
        self.known.clear();
        self.subscriptions.detach_contract();
        self.snapshot.advance_epoch();
    }

    // === Records ===

    /// Reload every record from the contract.
    ///
    /// Without a binding this does nothing and reports the current state.
    pub async fn reload(&mut self) -> LoadState {
        let Some(contract) = self.binding.as_ref().map(|b| Arc::clone(&b.contract)) else {
            return self.snapshot.state();
        };

        let ticket = self.snapshot.begin_reload();
        let outcome = load_all(&*contract).await;
        self.snapshot.commit(ticket, outcome);
        self.snapshot.state()
    }

    // === Mutations ===

    /// File a new report as the active identity.
    pub async fn register(&mut self, details: &str, crime_type: &str) -> Result<TxReceipt> {
        let details = details.trim();
        let crime_type = crime_type.trim();
        if details.is_empty() {
            return Err(SessionError::InvalidInput("FIR details are required".into()));
        }
        if crime_type.is_empty() {
            return Err(SessionError::InvalidInput("crime type is required".into()));
        }
        if !self.config.is_known_crime_type(crime_type) {
            debug!(crime_type, "Crime type is not one of the configured presets");
        }

        let contract = self.bound_contract()?;
        let receipt = {
            let _busy = BusyGuard::raise(&self.busy);
            let submitted = contract.register_case(details, crime_type).await;
            confirm(&*contract, submitted).await?
        };
        info!(tx = %receipt.hash, block = receipt.block_number, "FIR registered");
        self.reload().await;
        Ok(receipt)
    }

    /// Move a case to `target`, given by status name.
    ///
    /// Unknown names and non-forward moves are rejected before anything
    /// is sent.
    pub async fn advance_status(&mut self, id: u64, target: &str) -> Result<TxReceipt> {
        let target = CaseStatus::from_name(target)?;
        let binding = self.binding.as_ref().ok_or(SessionError::NotConnected)?;
        if !binding.privileged {
            return Err(SessionError::NotPrivileged);
        }
        if let Some(record) = self.snapshot.get(id) {
            if target <= record.status {
                return Err(SessionError::StatusRegression {
                    id,
                    current: record.status,
                    target,
                });
            }
        }

        let contract = Arc::clone(&binding.contract);
        let receipt = {
            let _busy = BusyGuard::raise(&self.busy);
            let submitted = contract.update_case_status(id, target.code()).await;
            confirm(&*contract, submitted).await?
        };
        info!(id, status = %target, tx = %receipt.hash, "Case status updated");
        self.reload().await;
        Ok(receipt)
    }

    /// Move a loaded case to the status after its current one.
    pub async fn advance_to_next(&mut self, id: u64) -> Result<TxReceipt> {
        let record = self
            .snapshot
            .get(id)
            .ok_or_else(|| SessionError::InvalidInput(format!("case #{id} is not loaded")))?;
        let next = record.next_status().ok_or(SessionError::StatusRegression {
            id,
            current: record.status,
            target: record.status,
        })?;
        self.advance_status(id, next.as_str()).await
    }

    fn bound_contract(&self) -> Result<Arc<dyn RegistryContract>> {
        self.binding
            .as_ref()
            .map(|b| Arc::clone(&b.contract))
            .ok_or(SessionError::NotConnected)
    }

    // === External events ===

    /// Wait for the next wallet or contract event.
    ///
    /// Returns `None` once no subscription is attached.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.subscriptions.next().await
    }

    /// Apply an external event.
    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Wallet(WalletEvent::AccountsChanged(accounts)) => {
                self.on_accounts_changed(accounts).await
            }
            SessionEvent::Wallet(WalletEvent::ChainChanged(chain)) => {
                self.network = NetworkStatus::evaluate(chain, self.config.chain_id);
                info!(chain = %chain, correct = self.network.is_correct, "Wallet chain changed");
                Ok(())
            }
            SessionEvent::CaseRegistered { epoch, event } => {
                self.on_case_registered(epoch, event);
                Ok(())
            }
        }
    }

    /// Process events until every subscription is gone.
    pub async fn run(&mut self) {
        while let Some(event) = self.next_event().await {
            if let Err(e) = self.handle_event(event).await {
                warn!(error = %e, "Event handling failed");
            }
        }
    }

    async fn on_accounts_changed(&mut self, accounts: Vec<Address>) -> Result<()> {
        let Some(first) = accounts.first().copied() else {
            info!("Wallet exposed no accounts, clearing session");
            self.clear_session();
            return Ok(());
        };

        info!(account = %first, accounts = accounts.len(), "Wallet accounts changed");
        self.bind(first, accounts).await
    }

    fn on_case_registered(&mut self, epoch: u64, event: CaseRegistered) {
        let record = match Record::provisional(
            event.id,
            event.complainant,
            event.crime_type,
            event.timestamp,
            self.config.placeholder_details.clone(),
        ) {
            Ok(record) => record,
            Err(e) => {
                warn!(id = event.id, error = %e, "Ignoring creation event");
                return;
            }
        };

        if self.snapshot.insert_provisional(epoch, record) {
            debug!(id = event.id, "Provisional record added");
        }
    }
}

/// Wait for a submitted transaction; every failure becomes `TransactionFailed`.
async fn confirm(
    contract: &dyn RegistryContract,
    submitted: std::result::Result<TxHash, ContractError>,
) -> Result<TxReceipt> {
    let hash = submitted.map_err(|e| {
        warn!(error = %e, "Transaction submission failed");
        SessionError::TransactionFailed
    })?;

    let receipt = contract.wait_for_receipt(hash).await.map_err(|e| {
        warn!(tx = %hash, error = %e, "Waiting for confirmation failed");
        SessionError::TransactionFailed
    })?;

    if !receipt.success {
        warn!(tx = %hash, "Transaction reverted");
        return Err(SessionError::TransactionFailed);
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::InMemoryRegistry;
    use crate::types::ChainId;
    use crate::wallet::MockWallet;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn setup(accounts: Vec<Address>) -> (LedgerSession, Arc<MockWallet>, InMemoryRegistry) {
        let config = LedgerConfig::default();
        let registry = InMemoryRegistry::new(config.contract_address, addr(1));
        let wallet = Arc::new(MockWallet::new(ChainId::SEPOLIA, accounts));
        let session = LedgerSession::new(config, Some(wallet.clone()), Arc::new(registry.clone()));
        (session, wallet, registry)
    }

    #[tokio::test]
    async fn test_provider_missing() {
        let registry = InMemoryRegistry::new(Address::ZERO, addr(1));
        let mut session = LedgerSession::new(LedgerConfig::default(), None, Arc::new(registry));

        assert_eq!(session.connect().await, Err(SessionError::ProviderMissing));
        assert!(!session.refresh_network().await.provider_present);
    }

    #[tokio::test]
    async fn test_user_rejected() {
        let config = LedgerConfig::default();
        let registry = InMemoryRegistry::new(config.contract_address, addr(1));
        let wallet = Arc::new(MockWallet::new(ChainId::SEPOLIA, vec![addr(2)]).with_rejected_accounts(true));
        let mut session = LedgerSession::new(config, Some(wallet), Arc::new(registry));

        assert_eq!(session.connect().await, Err(SessionError::UserRejected));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_no_accounts_exposed() {
        let (mut session, _, _) = setup(vec![]);
        assert_eq!(session.connect().await, Err(SessionError::UserRejected));
    }

    #[tokio::test]
    async fn test_wrong_network_after_rejected_switch() {
        let config = LedgerConfig::default();
        let registry = InMemoryRegistry::new(config.contract_address, addr(1));
        let wallet = Arc::new(MockWallet::new(ChainId::MAINNET, vec![addr(2)]).with_rejected_switch(true));
        let mut session = LedgerSession::new(config, Some(wallet.clone()), Arc::new(registry));

        assert_eq!(
            session.connect().await,
            Err(SessionError::WrongNetwork {
                expected: ChainId::SEPOLIA,
                actual: ChainId::MAINNET,
            })
        );
        assert_eq!(wallet.switch_calls(), 1);
        assert_eq!(wallet.account_requests(), 0);
        assert!(!session.network().is_correct);
    }

    #[tokio::test]
    async fn test_switch_unknown_identity() {
        let (mut session, _, _) = setup(vec![addr(2)]);
        session.connect().await.unwrap();

        assert!(matches!(
            session.switch_active_identity(addr(3)).await,
            Err(SessionError::UnknownIdentity(_))
        ));
        assert_eq!(session.active_identity(), Some(addr(2)));
    }

    #[tokio::test]
    async fn test_register_requires_connection() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        assert_eq!(
            session.register("details", "Theft").await,
            Err(SessionError::NotConnected)
        );
        assert_eq!(registry.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_register_whitespace_rejected() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        session.connect().await.unwrap();

        assert!(matches!(
            session.register("   ", "Theft").await,
            Err(SessionError::InvalidInput(_))
        ));
        assert!(matches!(
            session.register("details", "").await,
            Err(SessionError::InvalidInput(_))
        ));
        assert_eq!(registry.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_transaction_failure_leaves_state() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        session.connect().await.unwrap();
        registry.set_reject_writes(true);

        assert_eq!(
            session.register("details", "Theft").await,
            Err(SessionError::TransactionFailed)
        );
        assert!(!session.is_busy());
        assert_eq!(session.load_state(), LoadState::Empty);
    }

    #[tokio::test]
    async fn test_advance_requires_privilege() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        let id = registry.seed_case(addr(2), "a", "Theft", CaseStatus::Registered);
        session.connect().await.unwrap();

        assert_eq!(
            session.advance_status(id, "Investigating").await,
            Err(SessionError::NotPrivileged)
        );
        assert!(registry.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_advance_invalid_status_not_sent() {
        let (mut session, _, registry) = setup(vec![addr(1)]);
        let id = registry.seed_case(addr(2), "a", "Theft", CaseStatus::Registered);
        session.connect().await.unwrap();
        assert!(session.is_privileged());

        assert_eq!(
            session.advance_status(id, "Archived").await,
            Err(SessionError::InvalidStatus("Archived".into()))
        );
        assert!(registry.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_advance_to_next() {
        let (mut session, _, registry) = setup(vec![addr(1)]);
        let id = registry.seed_case(addr(2), "a", "Theft", CaseStatus::Investigating);
        session.connect().await.unwrap();

        session.advance_to_next(id).await.unwrap();
        assert_eq!(session.record(id).unwrap().status, CaseStatus::Closed);

        assert!(matches!(
            session.advance_to_next(id).await,
            Err(SessionError::StatusRegression { .. })
        ));
        assert_eq!(registry.status_updates(), vec![(id, 2)]);
    }

    #[tokio::test]
    async fn test_cancelled_write_clears_busy() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        session.connect().await.unwrap();
        registry.set_stall_receipts(true);
        let busy = session.busy_flag();

        {
            let mut write = tokio_test::task::spawn(session.register("details", "Theft"));
            tokio_test::assert_pending!(write.poll());
            assert!(busy.load(Ordering::SeqCst));
        }

        assert!(!session.is_busy());
        assert_eq!(registry.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_binding_on_connect() {
        let (mut session, _, registry) = setup(vec![addr(2)]);
        registry.set_fail_connect(true);

        assert!(matches!(
            session.connect().await,
            Err(SessionError::ReadFailure(_))
        ));
        assert!(!session.is_connected());
        assert!(session.known_identities().is_empty());
        assert_eq!(registry.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_detaches_everything() {
        let (mut session, wallet, registry) = setup(vec![addr(2)]);
        session.connect().await.unwrap();
        assert_eq!(wallet.listener_count(), 1);
        assert_eq!(registry.listener_count(), 1);

        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(wallet.listener_count(), 0);
        assert_eq!(registry.listener_count(), 0);
        assert_eq!(session.next_event().await, None);
    }
}
