//! Contract reads: privilege check and full record load.

use tracing::{debug, warn};

use crate::contract::RegistryContract;
use crate::error::{Result, SessionError};
use crate::record::Record;
use crate::types::Address;

/// Largest case count a load will attempt
pub const MAX_CASE_COUNT: u64 = 100_000;

/// Result of a full record load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Records, most recent first
    Loaded(Vec<Record>),
    /// The contract holds no records
    Empty,
    /// A read failed; nothing was kept
    Failed(String),
}

/// Whether `identity` is the contract administrator.
///
/// Read errors count as unprivileged.
pub async fn is_privileged(contract: &dyn RegistryContract, identity: Address) -> bool {
    match contract.admin().await {
        Ok(admin) => admin == identity,
        Err(e) => {
            warn!(identity = %identity, error = %e, "Admin lookup failed, treating as unprivileged");
            false
        }
    }
}

/// Read every record, most recent first.
///
/// Any failing read aborts the load; partial results are never returned.
pub async fn load_all(contract: &dyn RegistryContract) -> LoadOutcome {
    match read_all(contract).await {
        Ok(records) if records.is_empty() => LoadOutcome::Empty,
        Ok(records) => LoadOutcome::Loaded(records),
        Err(e) => {
            warn!(error = %e, "Record load failed");
            LoadOutcome::Failed(e.to_string())
        }
    }
}

async fn read_all(contract: &dyn RegistryContract) -> Result<Vec<Record>> {
    let count = contract.case_count().await?;
    if count > MAX_CASE_COUNT {
        return Err(SessionError::ReadFailure(format!(
            "case count {count} exceeds limit {MAX_CASE_COUNT}"
        )));
    }
    debug!(count, "Loading records");

    let mut records = Vec::with_capacity(count.min(1024) as usize);
    for index in 1..=count {
        let data = contract.get_case(index).await?;
        records.push(Record::from_case(data)?);
    }

    records.reverse();
    Ok(records)
}
