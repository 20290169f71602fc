use std::sync::Arc;

use tracing::{info, warn};

use crate::context::Violation;
use crate::error::GovernanceError;
use crate::event::{FrozenRecord, GovernanceEvent};
use crate::gate::ReviewResult;
use crate::ledger::{Ledger, LedgerEntry};

/// Sole writer of `PLAN_FROZEN`.
///
/// A freeze is one compare-and-append against the lineage history the caller
/// read. If another writer got there first the append fails and no authority
/// is granted.
pub struct FreezeAuthority {
    ledger: Arc<dyn Ledger>,
}

impl FreezeAuthority {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn freeze(
        &self,
        review: &ReviewResult,
        lock_violations: &[Violation],
        record: FrozenRecord,
        expected_len: usize,
    ) -> Result<LedgerEntry, GovernanceError> {
        if !review.admissible() {
            return Err(GovernanceError::FreezePrecondition(
                "not every enabled check passed".into(),
            ));
        }
        if !lock_violations.is_empty() {
            return Err(GovernanceError::FreezePrecondition(
                "locked sections were modified".into(),
            ));
        }
        if !record.authority_granted {
            return Err(GovernanceError::FreezePrecondition(
                "frozen record must grant authority".into(),
            ));
        }

        for contradiction in &review.contradictions {
            warn!(
                entity = %contradiction.entity,
                predicate_key = %contradiction.predicate_key,
                values = contradiction.values.len(),
                "Freezing plan with contradictory invariants"
            );
        }

        let lineage = record.lineage.clone();
        let entry = self
            .ledger
            .append(&lineage, expected_len, GovernanceEvent::PlanFrozen(record))
            .await?;
        info!(
            lineage = %lineage,
            seq = entry.seq,
            plan_hash = %entry.event.plan_hash(),
            "Plan frozen"
        );
        Ok(entry)
    }

    /// Append a rejection for audit and retry accounting.
    pub async fn record_rejection(
        &self,
        event: GovernanceEvent,
        expected_len: usize,
    ) -> Result<LedgerEntry, GovernanceError> {
        if event.is_frozen() || event.authority_granted() {
            return Err(GovernanceError::FreezePrecondition(
                "rejections never carry authority".into(),
            ));
        }
        let lineage = event.lineage().to_string();
        let entry = self.ledger.append(&lineage, expected_len, event).await?;
        info!(
            lineage = %lineage,
            seq = entry.seq,
            event_type = entry.event.event_type(),
            "Rejection recorded"
        );
        Ok(entry)
    }
}
