//! Display model for FIR records.
//!
//! Records are a read model only. They are rebuilt from contract reads
//! and never written back.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::CaseData;
use crate::error::{Result, SessionError};
use crate::types::{Address, CaseStatus};

/// A single FIR entry as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Record {
    /// Contract-assigned id, starting at 1
    pub id: u64,
    /// Account that filed the report
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub complainant: Address,
    /// Free-text details
    pub details: String,
    /// Crime type / category
    pub crime_type: String,
    pub status: CaseStatus,
    /// Contract timestamp
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    /// True for entries synthesized from an event and not yet confirmed by a reload
    pub provisional: bool,
}

impl Record {
    /// Normalize a raw contract tuple.
    ///
    /// Fails on a status code outside the table or a timestamp chrono
    /// cannot represent; the synchronizer treats either as a read failure.
    pub fn from_case(data: CaseData) -> Result<Self> {
        let status = CaseStatus::from_code(data.status_code).ok_or_else(|| {
            SessionError::ReadFailure(format!(
                "case #{} has unknown status code {}",
                data.id, data.status_code
            ))
        })?;

        Ok(Self {
            id: data.id,
            complainant: data.complainant,
            details: data.details,
            crime_type: data.crime_type,
            status,
            created_at: timestamp_from_secs(data.timestamp)?,
            provisional: false,
        })
    }

    /// Provisional entry built from a creation event
    pub fn provisional(
        id: u64,
        complainant: Address,
        crime_type: impl Into<String>,
        timestamp: u64,
        placeholder: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            id,
            complainant,
            details: placeholder.into(),
            crime_type: crime_type.into(),
            status: CaseStatus::Registered,
            created_at: timestamp_from_secs(timestamp)?,
            provisional: true,
        })
    }

    /// Timestamp in the local time zone, e.g. `19/10/2026, 14:03:07`
    pub fn display_timestamp(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%d/%m/%Y, %H:%M:%S")
            .to_string()
    }

    /// Status an administrator can move this record to, if any
    pub fn next_status(&self) -> Option<CaseStatus> {
        self.status.next()
    }
}

fn timestamp_from_secs(secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| SessionError::ReadFailure(format!("timestamp {secs} out of range")))
}

/// Station counters over a record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RecordStats {
    pub total: usize,
    pub registered: usize,
    /// Cases under investigation
    pub active: usize,
    pub closed: usize,
}

impl RecordStats {
    pub fn from_records(records: &[Record]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.status {
                CaseStatus::Registered => stats.registered += 1,
                CaseStatus::Investigating => stats.active += 1,
                CaseStatus::Closed => stats.closed += 1,
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: u64, status_code: u8) -> CaseData {
        CaseData {
            id,
            complainant: Address::from_bytes([7u8; 20]),
            details: format!("details {id}"),
            crime_type: "Theft".to_string(),
            status_code,
            timestamp: 1_700_000_000 + id,
        }
    }

    #[test]
    fn test_from_case() {
        let record = Record::from_case(case(4, 1)).unwrap();
        assert_eq!(record.id, 4);
        assert_eq!(record.status, CaseStatus::Investigating);
        assert_eq!(record.created_at.timestamp(), 1_700_000_004);
        assert!(!record.provisional);
        assert_eq!(record.next_status(), Some(CaseStatus::Closed));
    }

    #[test]
    fn test_unknown_status_code_is_read_failure() {
        let err = Record::from_case(case(1, 9)).unwrap_err();
        assert!(matches!(err, SessionError::ReadFailure(_)));
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let mut data = case(1, 0);
        data.timestamp = u64::MAX;
        assert!(Record::from_case(data).is_err());
    }

    #[test]
    fn test_provisional() {
        let record = Record::provisional(
            7,
            Address::ZERO,
            "Fraud",
            1_700_000_000,
            "New FIR Registered",
        )
        .unwrap();
        assert!(record.provisional);
        assert_eq!(record.status, CaseStatus::Registered);
        assert_eq!(record.details, "New FIR Registered");
        assert!(!record.display_timestamp().is_empty());
    }

    #[test]
    fn test_stats() {
        let records: Vec<Record> = [0u8, 1, 1, 2, 0]
            .iter()
            .enumerate()
            .map(|(i, code)| Record::from_case(case(i as u64 + 1, *code)).unwrap())
            .collect();

        let stats = RecordStats::from_records(&records);
        assert_eq!(
            stats,
            RecordStats {
                total: 5,
                registered: 2,
                active: 2,
                closed: 1,
            }
        );
        assert_eq!(RecordStats::from_records(&[]), RecordStats::default());
    }
}
