//! Ledger session: identity binding, record snapshot, and event handling.
//!
//! - [`LedgerSession`] owns every piece of session state
//! - Snapshot with epoch/sequence tags against stale results
//! - Subscriptions for wallet notifications and contract logs

pub mod listener;
pub mod manager;
pub mod network;
pub mod snapshot;
pub mod sync;

pub use listener::{EventSubscriptions, SessionEvent};
pub use manager::{Binding, LedgerSession};
pub use network::NetworkStatus;
pub use snapshot::{LoadState, RecordSnapshot, ReloadTicket};
pub use sync::{is_privileged, load_all, LoadOutcome};
