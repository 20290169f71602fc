//! Retry and invariant-locking controller.
//!
//! A lineage gets exactly one retry. When a fresh submission fails, the
//! sections that passed untouched are locked by digest; the retry must leave
//! them byte-identical under canonicalization. A second failure exhausts the
//! lineage for good.

use std::collections::BTreeMap;

use plan_gate_canonical::{digest, CanonicalError, Digest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{Violation, ViolationKind};
use crate::event::{FrozenRecord, GovernanceEvent};
use crate::ledger::LedgerEntry;
use crate::plan::section_value;

/// Controller states for a single evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryPhase {
    Evaluating,
    Pass,
    Fail,
    RetryPermitted,
    RetryExhausted,
}

/// Retry state of a lineage, derived from its ledger history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryState {
    /// Retry-permitting rejections recorded so far. Never exceeds the budget:
    /// a failure at the budget exhausts the lineage instead.
    pub attempt_count: u32,
    /// Sections locked by the most recent rejection.
    pub locked_sections: BTreeMap<String, Digest>,
    pub exhausted: bool,
    pub frozen: Option<FrozenRecord>,
}

impl RetryState {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn from_history(history: &[LedgerEntry]) -> Self {
        let mut state = Self::fresh();
        for entry in history {
            match &entry.event {
                GovernanceEvent::PlanRejected(record) => {
                    state.attempt_count += 1;
                    state.locked_sections = record.locked_sections.clone();
                }
                GovernanceEvent::FailureRetryExhausted(_) => {
                    state.exhausted = true;
                }
                GovernanceEvent::PlanFrozen(record) => {
                    state.frozen = Some(record.clone());
                }
            }
        }
        state
    }

    /// Zero-based number of the submission being evaluated.
    pub fn current_attempt(&self) -> u32 {
        self.attempt_count
    }
}

/// Lock every section by the digest of its current content.
pub fn lock_sections(
    document: &Value,
    sections: &[String],
) -> Result<BTreeMap<String, Digest>, CanonicalError> {
    sections
        .iter()
        .map(|section| Ok((section.clone(), digest(section_value(document, section))?)))
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub struct RetryController {
    budget: u32,
}

impl RetryController {
    pub fn new(budget: u32) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Whether the lineage may still be evaluated at all.
    pub fn is_exhausted(&self, state: &RetryState) -> bool {
        state.exhausted || state.attempt_count > self.budget
    }

    /// Compare the resubmission against the locks of the previous rejection.
    pub fn verify_locks(
        &self,
        state: &RetryState,
        document: &Value,
    ) -> Result<Vec<Violation>, CanonicalError> {
        let mut violations = Vec::new();
        for (section, locked) in &state.locked_sections {
            let current = digest(section_value(document, section))?;
            if current != *locked {
                warn!(section = %section, "Locked section modified on retry");
                violations.push(
                    Violation::from_controller(
                        ViolationKind::LockedSectionModified,
                        section.clone(),
                        format!(
                            "Locked section '{section}' was modified (expected {locked}, found {current})"
                        ),
                    )
                    .with_reference(section.clone()),
                );
            }
        }
        debug!(
            locked = state.locked_sections.len(),
            modified = violations.len(),
            "Locked sections verified"
        );
        Ok(violations)
    }

    /// Transition out of `Evaluating` once the outcome is known.
    pub fn decide(&self, state: &RetryState, passed: bool) -> RetryPhase {
        let outcome = if passed { RetryPhase::Pass } else { RetryPhase::Fail };
        let next = match outcome {
            RetryPhase::Pass => RetryPhase::Pass,
            _ if state.attempt_count < self.budget => RetryPhase::RetryPermitted,
            _ => RetryPhase::RetryExhausted,
        };
        info!(
            attempt = state.attempt_count,
            budget = self.budget,
            outcome = ?outcome,
            next = ?next,
            "Retry controller transition"
        );
        next
    }

    /// Violation reported for a different plan on an already frozen lineage.
    pub fn frozen_violation(&self, frozen: &FrozenRecord) -> Violation {
        Violation::from_controller(
            ViolationKind::LineageFrozen,
            "lineage",
            format!(
                "Lineage '{}' is already frozen under plan {}",
                frozen.lineage, frozen.plan_hash
            ),
        )
        .with_reference(frozen.plan_hash.to_hex())
    }

    /// Violation reported for a submission on an exhausted lineage.
    pub fn exhausted_violation(&self) -> Violation {
        Violation::from_controller(
            ViolationKind::RetryBudgetExhausted,
            "lineage",
            format!(
                "Retry budget of {} exhausted; no further submissions are evaluated",
                self.budget
            ),
        )
    }
}
