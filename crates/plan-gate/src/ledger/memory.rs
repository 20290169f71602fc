use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::event::GovernanceEvent;
use crate::ledger::{check_append, new_entry, Ledger, LedgerEntry};

/// In-memory ledger used for tests and embedding.
#[derive(Default)]
pub struct InMemoryLedger {
    lineages: RwLock<HashMap<String, Vec<LedgerEntry>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all lineages.
    pub fn len(&self) -> Result<usize, LedgerError> {
        let lineages = self.lineages.read().map_err(|_| poisoned("read"))?;
        Ok(lineages.values().map(Vec::len).sum())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned(kind: &str) -> LedgerError {
    LedgerError::IntegrityViolation {
        seq: 0,
        reason: format!("ledger {kind} lock poisoned"),
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn lineage_history(&self, lineage: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let lineages = self.lineages.read().map_err(|_| poisoned("read"))?;
        Ok(lineages.get(lineage).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        lineage: &str,
        expected_len: usize,
        event: GovernanceEvent,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut lineages = self.lineages.write().map_err(|_| poisoned("write"))?;
        let history = lineages.entry(lineage.to_string()).or_default();
        check_append(lineage, history, expected_len, &event)?;

        let entry = new_entry(lineage, history.len() as u64 + 1, event);
        history.push(entry.clone());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ledger::test_support::{frozen, rejected};
    use crate::ledger::validate_lineage;

    #[tokio::test]
    async fn appends_and_reads_back() {
        let ledger = InMemoryLedger::new();
        let first = ledger.append("checkout", 0, rejected("checkout")).await.unwrap();
        assert_eq!(first.seq, 1);
        ledger.append("checkout", 1, frozen("checkout")).await.unwrap();

        let history = ledger.lineage_history("checkout").await.unwrap();
        assert_eq!(history.len(), 2);
        validate_lineage(&history).unwrap();
        assert!(ledger.lineage_history("billing").await.unwrap().is_empty());
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_append_conflicts() {
        let ledger = InMemoryLedger::new();
        ledger.append("checkout", 0, rejected("checkout")).await.unwrap();
        let err = ledger
            .append("checkout", 0, rejected("checkout"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn frozen_lineage_accepts_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.append("checkout", 0, frozen("checkout")).await.unwrap();
        let err = ledger.append("checkout", 1, frozen("checkout")).await.unwrap_err();
        assert_eq!(err, LedgerError::AlreadyFrozen("checkout".into()));
    }

    #[tokio::test]
    async fn concurrent_freezes_have_one_winner() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.append("checkout", 0, frozen("checkout")).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ledger.len().unwrap(), 1);
    }
}
