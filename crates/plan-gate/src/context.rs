use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::ArchitectureContract;
use crate::manifest::{CheckId, GovernanceManifest};
use crate::plan::Plan;

/// Check id carried by violations the retry controller raises itself.
pub const RETRY_CONTROLLER_ID: &str = "RG-RETRY";

/// What a check is looking at.
///
/// `plan` is `None` only while gating checks run; every non-gating check sees a
/// plan that already passed schema validation.
#[derive(Clone, Copy, Debug)]
pub struct ReviewSubject<'a> {
    pub document: &'a Value,
    pub plan: Option<&'a Plan>,
    pub contract: &'a ArchitectureContract,
    pub manifest: &'a GovernanceManifest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    SchemaInvalid,
    InvariantDomainEmpty,
    UnresolvedReference,
    InvalidReferenceSyntax,
    DagDanglingNode,
    DagCycle,
    WeakFormatMismatch,
    LockedSectionModified,
    RetryBudgetExhausted,
    LineageFrozen,
}

/// A single reason a plan is inadmissible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub check_id: String,
    pub kind: ViolationKind,
    /// Plan section the violation touches; such a section is never locked.
    pub section: String,
    pub message: String,
    pub reference: Option<String>,
}

impl Violation {
    pub fn new(
        check: CheckId,
        kind: ViolationKind,
        section: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check.to_string(),
            kind,
            section: section.into(),
            message: message.into(),
            reference: None,
        }
    }

    pub fn from_controller(
        kind: ViolationKind,
        section: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: RETRY_CONTROLLER_ID.to_string(),
            kind,
            section: section.into(),
            message: message.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Serialized form of a violation inside a rejection record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionEntry {
    pub check_id: String,
    pub section: String,
    pub message: String,
    pub reference: Option<String>,
}

impl From<&Violation> for RejectionEntry {
    fn from(v: &Violation) -> Self {
        Self {
            check_id: v.check_id.clone(),
            section: v.section.clone(),
            message: v.message.clone(),
            reference: v.reference.clone(),
        }
    }
}

/// Outcome of one check within a review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub check_id: CheckId,
    pub sections: Vec<String>,
    pub violations: Vec<Violation>,
    /// Set when a gating failure prevented the check from running.
    pub skipped: bool,
}

impl CheckReport {
    pub fn skipped(check_id: CheckId, sections: Vec<String>) -> Self {
        Self {
            check_id,
            sections,
            violations: Vec::new(),
            skipped: true,
        }
    }

    pub fn passed(&self) -> bool {
        !self.skipped && self.violations.is_empty()
    }
}
