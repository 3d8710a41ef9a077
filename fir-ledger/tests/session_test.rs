//! End-to-end session scenarios against the mock wallet and in-memory registry

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok, assert_pending};

use fir_ledger::contract::CaseRegistered;
use fir_ledger::{
    Address, CaseStatus, ChainId, InMemoryRegistry, LedgerConfig, LedgerSession, LoadState,
    MockWallet, SessionError, SessionEvent, WalletEvent,
};

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

const ADMIN: u8 = 0xad;
const CITIZEN: u8 = 0xa1;
const OTHER: u8 = 0xb2;

struct Harness {
    session: LedgerSession,
    wallet: Arc<MockWallet>,
    registry: InMemoryRegistry,
}

fn harness(chain: ChainId, accounts: Vec<Address>) -> Harness {
    let config = LedgerConfig::default();
    let registry = InMemoryRegistry::new(config.contract_address, addr(ADMIN));
    let wallet = Arc::new(MockWallet::new(chain, accounts));
    let session = LedgerSession::new(config, Some(wallet.clone()), Arc::new(registry.clone()));
    Harness {
        session,
        wallet,
        registry,
    }
}

fn seed(registry: &InMemoryRegistry, n: usize) {
    for i in 1..=n {
        registry.seed_case(addr(CITIZEN), &format!("report {i}"), "Theft", CaseStatus::Registered);
    }
}

#[tokio::test]
async fn test_connect_on_wrong_chain_switches_and_loads() {
    let mut h = harness(ChainId::MAINNET, vec![addr(CITIZEN), addr(OTHER)]);
    seed(&h.registry, 2);

    let accounts = assert_ok!(h.session.connect().await);

    assert_eq!(h.wallet.switch_calls(), 1);
    assert_eq!(accounts, vec![addr(CITIZEN), addr(OTHER)]);
    assert_eq!(h.session.active_identity(), Some(addr(CITIZEN)));
    assert_eq!(h.session.known_identities(), &[addr(CITIZEN), addr(OTHER)]);
    assert!(!h.session.is_privileged());
    assert_eq!(h.session.load_state(), LoadState::Loaded);
    assert_eq!(h.session.records().len(), 2);
    assert!(h.session.network().is_correct);
    assert_eq!(h.session.network().chain_name, "Sepolia Testnet");
}

#[tokio::test]
async fn test_connect_on_right_chain_skips_switch() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);

    h.session.connect().await.unwrap();

    assert_eq!(h.wallet.switch_calls(), 0);
    assert!(h.session.is_privileged());
    assert_eq!(h.session.load_state(), LoadState::Empty);
    assert!(h.session.records().is_empty());
}

#[tokio::test]
async fn test_load_order_for_many_records() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    seed(&h.registry, 12);

    h.session.connect().await.unwrap();

    let ids: Vec<u64> = h.session.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=12).rev().collect::<Vec<_>>());
    assert_eq!(h.session.stats().total, 12);
}

#[tokio::test]
async fn test_read_failure_degrades_to_failed_state() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    seed(&h.registry, 3);
    h.registry.set_fail_reads(true);

    h.session.connect().await.unwrap();

    assert!(h.session.is_connected());
    assert!(!h.session.is_privileged());
    assert!(h.session.records().is_empty());
    assert_eq!(h.session.load_state(), LoadState::Failed);
    assert!(h.session.load_failure().is_some());

    h.registry.set_fail_reads(false);
    assert_eq!(h.session.reload().await, LoadState::Loaded);
    assert_eq!(h.session.records().len(), 3);
    assert_eq!(h.session.load_failure(), None);
}

#[tokio::test]
async fn test_register_empty_description_sends_nothing() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    h.session.connect().await.unwrap();

    let err = assert_err!(h.session.register("", "Theft").await);

    assert!(matches!(err, SessionError::InvalidInput(_)));
    assert_eq!(h.registry.transaction_count(), 0);
    assert!(h.registry.cases().is_empty());
}

#[tokio::test]
async fn test_register_confirms_then_reloads() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    h.session.connect().await.unwrap();

    let receipt = h
        .session
        .register("  Wallet stolen near the station  ", "Theft")
        .await
        .unwrap();

    assert!(receipt.success);
    assert!(!h.session.is_busy());
    let record = &h.session.records()[0];
    assert_eq!(record.id, 1);
    assert_eq!(record.details, "Wallet stolen near the station");
    assert_eq!(record.complainant, addr(CITIZEN));
    assert_eq!(record.status, CaseStatus::Registered);
    assert!(!record.provisional);

    // The creation log for our own report arrives after the reload
    let event = h.session.next_event().await.unwrap();
    h.session.handle_event(event).await.unwrap();
    assert_eq!(h.session.records().len(), 1);
    assert!(!h.session.records()[0].provisional);
}

#[tokio::test]
async fn test_admin_advances_only_the_target_record() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    seed(&h.registry, 5);
    h.session.connect().await.unwrap();
    let before = h.session.records().to_vec();

    h.session.advance_status(3, "Investigating").await.unwrap();

    assert_eq!(h.registry.status_updates(), vec![(3, 1)]);
    assert_eq!(h.session.record(3).unwrap().status, CaseStatus::Investigating);
    for (old, new) in before.iter().zip(h.session.records()) {
        if old.id != 3 {
            assert_eq!(old, new);
        }
    }
    assert_eq!(h.session.stats().active, 1);
    assert_eq!(h.session.stats().registered, 4);
}

#[tokio::test]
async fn test_never_sends_backward_status() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    let id = h
        .registry
        .seed_case(addr(CITIZEN), "report", "Fraud", CaseStatus::Investigating);
    h.session.connect().await.unwrap();

    for target in ["Registered", "Reported", "Investigating"] {
        let result = h.session.advance_status(id, target).await;
        assert!(matches!(result, Err(SessionError::StatusRegression { .. })), "{target}");
    }
    assert!(h.registry.status_updates().is_empty());

    h.session.advance_status(id, "Resolved").await.unwrap();
    assert_eq!(h.registry.status_updates(), vec![(id, 2)]);
    assert_eq!(h.session.record(id).unwrap().status, CaseStatus::Closed);
}

#[tokio::test]
async fn test_creation_event_prepends_placeholder_until_reload() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    seed(&h.registry, 6);
    h.session.connect().await.unwrap();

    h.registry.emit_log(
        CaseRegistered {
            id: 7,
            complainant: addr(OTHER),
            crime_type: "Cyber Crime".into(),
            timestamp: 1_800_000_000,
        }
        .to_raw(),
    );
    let event = h.session.next_event().await.unwrap();
    assert!(matches!(event, SessionEvent::CaseRegistered { .. }));
    h.session.handle_event(event).await.unwrap();

    let first = &h.session.records()[0];
    assert_eq!(first.id, 7);
    assert!(first.provisional);
    assert_eq!(first.details, "New FIR Registered");
    assert_eq!(first.status, CaseStatus::Registered);
    assert_eq!(h.session.records().len(), 7);

    h.registry
        .seed_case(addr(OTHER), "Phishing email drained savings", "Cyber Crime", CaseStatus::Registered);
    h.session.reload().await;

    let first = &h.session.records()[0];
    assert_eq!(first.id, 7);
    assert!(!first.provisional);
    assert_eq!(first.details, "Phishing email drained savings");
    assert_eq!(h.session.records().len(), 7);
}

#[tokio::test]
async fn test_stale_creation_event_ignored() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN), addr(OTHER)]);
    h.session.connect().await.unwrap();
    let old_epoch = h.session.epoch();

    h.session.switch_active_identity(addr(OTHER)).await.unwrap();
    let event = SessionEvent::CaseRegistered {
        epoch: old_epoch,
        event: CaseRegistered {
            id: 1,
            complainant: addr(CITIZEN),
            crime_type: "Theft".into(),
            timestamp: 1_700_000_000,
        },
    };
    h.session.handle_event(event).await.unwrap();

    assert!(h.session.records().is_empty());
}

#[tokio::test]
async fn test_switch_identity_replaces_privilege_and_snapshot() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN), addr(ADMIN)]);
    seed(&h.registry, 2);
    h.session.connect().await.unwrap();
    assert!(!h.session.is_privileged());
    let epoch = h.session.epoch();

    h.registry.seed_case(addr(CITIZEN), "report 3", "Assault", CaseStatus::Registered);
    h.session.switch_active_identity(addr(ADMIN)).await.unwrap();

    assert_eq!(h.session.active_identity(), Some(addr(ADMIN)));
    assert!(h.session.is_privileged());
    assert!(h.session.epoch() > epoch);
    assert_eq!(h.session.records().len(), 3);
    assert_eq!(h.registry.listener_count(), 1);
}

#[tokio::test]
async fn test_wallet_account_change_rebinds() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    h.session.connect().await.unwrap();

    h.wallet.set_accounts(vec![addr(ADMIN), addr(CITIZEN)]);
    let event = h.session.next_event().await.unwrap();
    assert_eq!(
        event,
        SessionEvent::Wallet(WalletEvent::AccountsChanged(vec![addr(ADMIN), addr(CITIZEN)]))
    );
    h.session.handle_event(event).await.unwrap();

    assert_eq!(h.session.active_identity(), Some(addr(ADMIN)));
    assert!(h.session.is_privileged());
    assert_eq!(h.session.known_identities().len(), 2);
    assert_eq!(h.registry.listener_count(), 1);
}

#[tokio::test]
async fn test_empty_account_list_disconnects() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    seed(&h.registry, 2);
    h.session.connect().await.unwrap();

    h.wallet.set_accounts(vec![]);
    let event = h.session.next_event().await.unwrap();
    h.session.handle_event(event).await.unwrap();

    assert!(!h.session.is_connected());
    assert_eq!(h.session.active_identity(), None);
    assert!(h.session.known_identities().is_empty());
    assert!(!h.session.is_privileged());
    assert!(h.session.records().is_empty());
    assert_eq!(h.session.load_state(), LoadState::NotLoaded);
    assert_eq!(h.registry.listener_count(), 0);
    assert_eq!(h.wallet.listener_count(), 1);

    // Nothing queued, but the wallet is still listened to
    {
        let mut next = tokio_test::task::spawn(h.session.next_event());
        assert_pending!(next.poll());
    }

    // Reconnecting through the wallet brings the session back
    h.wallet.set_accounts(vec![addr(CITIZEN)]);
    let event = h.session.next_event().await.unwrap();
    h.session.handle_event(event).await.unwrap();
    assert_eq!(h.session.active_identity(), Some(addr(CITIZEN)));
    assert_eq!(h.session.records().len(), 2);
}

#[tokio::test]
async fn test_chain_change_updates_network_only() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    h.session.connect().await.unwrap();

    h.wallet.set_chain(ChainId::POLYGON);
    let event = h.session.next_event().await.unwrap();
    h.session.handle_event(event).await.unwrap();

    assert!(!h.session.network().is_correct);
    assert_eq!(h.session.network().chain_name, "Polygon Mainnet");
    assert!(h.session.is_connected());
    assert_eq!(h.wallet.switch_calls(), 0);
}

#[tokio::test]
async fn test_malformed_wallet_payload_skipped() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN)]);
    h.session.connect().await.unwrap();

    h.wallet
        .emit_raw(fir_ledger::wallet::RawWalletEvent::new("chainChanged", serde_json::json!("not-hex")));
    h.wallet.set_chain(ChainId::GOERLI);

    let event = h.session.next_event().await.unwrap();
    assert_eq!(event, SessionEvent::Wallet(WalletEvent::ChainChanged(ChainId::GOERLI)));
}

#[tokio::test]
async fn test_connect_errors() {
    let config = LedgerConfig::default();
    let registry = InMemoryRegistry::new(config.contract_address, addr(ADMIN));

    let mut missing = LedgerSession::new(config.clone(), None, Arc::new(registry.clone()));
    assert_eq!(missing.connect().await, Err(SessionError::ProviderMissing));

    let declined = Arc::new(MockWallet::new(ChainId::SEPOLIA, vec![addr(CITIZEN)]).with_rejected_accounts(true));
    let mut session = LedgerSession::new(config.clone(), Some(declined), Arc::new(registry.clone()));
    assert_eq!(session.connect().await, Err(SessionError::UserRejected));

    let stuck = Arc::new(MockWallet::new(ChainId::GOERLI, vec![addr(CITIZEN)]).with_rejected_switch(true));
    let mut session = LedgerSession::new(config, Some(stuck), Arc::new(registry));
    assert_eq!(
        session.connect().await,
        Err(SessionError::WrongNetwork {
            expected: ChainId::SEPOLIA,
            actual: ChainId::GOERLI,
        })
    );
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_contract_at_wrong_address_reads_fail() {
    let config = LedgerConfig::default();
    let registry = InMemoryRegistry::new(addr(0xee), addr(ADMIN));
    let wallet = Arc::new(MockWallet::new(ChainId::SEPOLIA, vec![addr(ADMIN)]));
    let mut session = LedgerSession::new(config, Some(wallet), Arc::new(registry));

    session.connect().await.unwrap();

    assert!(!session.is_privileged());
    assert_eq!(session.load_state(), LoadState::Failed);
}

#[tokio::test]
async fn test_failed_rebind_leaves_no_previous_identity() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    seed(&h.registry, 1);
    h.session.connect().await.unwrap();
    assert!(h.session.is_privileged());

    h.registry.set_fail_connect(true);
    h.wallet.set_accounts(vec![addr(CITIZEN)]);
    let event = h.session.next_event().await.unwrap();
    let err = assert_err!(h.session.handle_event(event).await);

    assert!(matches!(err, SessionError::ReadFailure(_)));
    assert_eq!(h.session.active_identity(), None);
    assert!(h.session.known_identities().is_empty());
    assert!(!h.session.is_privileged());
    assert!(h.session.records().is_empty());
    assert_eq!(h.session.load_state(), LoadState::NotLoaded);
    assert_eq!(h.registry.listener_count(), 0);
    assert_eq!(h.wallet.listener_count(), 1);

    // The next notification binds normally
    h.registry.set_fail_connect(false);
    h.wallet.set_accounts(vec![addr(CITIZEN)]);
    let event = h.session.next_event().await.unwrap();
    assert_ok!(h.session.handle_event(event).await);
    assert_eq!(h.session.active_identity(), Some(addr(CITIZEN)));
    assert!(!h.session.is_privileged());
    assert_eq!(h.session.records().len(), 1);
}

#[tokio::test]
async fn test_advance_while_disconnected() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(ADMIN)]);
    let id = h
        .registry
        .seed_case(addr(CITIZEN), "report", "Theft", CaseStatus::Registered);

    assert_eq!(
        h.session.advance_status(id, "Investigating").await,
        Err(SessionError::NotConnected)
    );

    h.session.connect().await.unwrap();
    h.session.disconnect();
    assert_eq!(
        h.session.advance_status(id, "Investigating").await,
        Err(SessionError::NotConnected)
    );
    assert!(h.registry.status_updates().is_empty());
}

#[tokio::test]
async fn test_switch_identity_with_failing_reads() {
    let mut h = harness(ChainId::SEPOLIA, vec![addr(CITIZEN), addr(ADMIN)]);
    seed(&h.registry, 2);
    h.session.connect().await.unwrap();
    assert_eq!(h.session.records().len(), 2);

    h.registry.set_fail_reads(true);
    assert_ok!(h.session.switch_active_identity(addr(ADMIN)).await);

    assert_eq!(h.session.active_identity(), Some(addr(ADMIN)));
    assert!(!h.session.is_privileged());
    assert!(h.session.records().is_empty());
    assert_eq!(h.session.load_state(), LoadState::Failed);
}
