//! Progress ledger boundary.
//!
//! The ledger is the only place governance state lives. Retry state is derived
//! from a lineage's history, and a freeze is a compare-and-append, so authority
//! and its ledger entry always appear together.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::event::GovernanceEvent;

pub use file::FileLedger;
pub use memory::InMemoryLedger;

/// One recorded governance event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    /// Position within the lineage, starting at 1.
    pub seq: u64,
    pub lineage: String,
    pub recorded_at: DateTime<Utc>,
    pub event: GovernanceEvent,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Every entry recorded for `lineage`, oldest first.
    async fn lineage_history(&self, lineage: &str) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Append `event` only if the lineage still holds exactly `expected_len`
    /// entries and is not frozen.
    async fn append(
        &self,
        lineage: &str,
        expected_len: usize,
        event: GovernanceEvent,
    ) -> Result<LedgerEntry, LedgerError>;
}

/// Compare-and-append precondition shared by the stores.
pub(crate) fn check_append(
    lineage: &str,
    history: &[LedgerEntry],
    expected_len: usize,
    event: &GovernanceEvent,
) -> Result<(), LedgerError> {
    if history.iter().any(|e| e.event.is_frozen()) {
        return Err(LedgerError::AlreadyFrozen(lineage.to_string()));
    }
    if history.len() != expected_len {
        return Err(LedgerError::Conflict {
            lineage: lineage.to_string(),
            expected: expected_len,
            actual: history.len(),
        });
    }
    if event.lineage() != lineage {
        return Err(LedgerError::IntegrityViolation {
            seq: history.len() as u64 + 1,
            reason: format!(
                "event for lineage '{}' appended under '{lineage}'",
                event.lineage()
            ),
        });
    }
    Ok(())
}

pub(crate) fn new_entry(lineage: &str, seq: u64, event: GovernanceEvent) -> LedgerEntry {
    LedgerEntry {
        entry_id: Uuid::new_v4(),
        seq,
        lineage: lineage.to_string(),
        recorded_at: Utc::now(),
        event,
    }
}

/// Validate sequence numbering and terminal ordering for one lineage.
pub fn validate_lineage(history: &[LedgerEntry]) -> Result<(), LedgerError> {
    let mut frozen = false;
    for (index, entry) in history.iter().enumerate() {
        let expected_seq = index as u64 + 1;
        if entry.seq != expected_seq {
            return Err(LedgerError::IntegrityViolation {
                seq: entry.seq,
                reason: format!("expected seq {expected_seq}, found {}", entry.seq),
            });
        }
        if frozen {
            return Err(LedgerError::IntegrityViolation {
                seq: entry.seq,
                reason: "entry recorded after PLAN_FROZEN".into(),
            });
        }
        if entry.event.lineage() != entry.lineage {
            return Err(LedgerError::IntegrityViolation {
                seq: entry.seq,
                reason: "event lineage does not match entry lineage".into(),
            });
        }
        frozen = entry.event.is_frozen();
    }
    Ok(())
}
