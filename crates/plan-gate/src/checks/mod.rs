//! Reviewer gate checks.
//!
//! Each check is independent: it sees the submitted document, the typed plan
//! (once schema validation passed), the contract and the manifest, and returns
//! every violation it finds. Aggregation never inspects what a check does, so
//! a new rule is a new [`ReviewerCheck`] plus a [`CheckId`].

pub mod dag;
pub mod invariant;
pub mod reference;
pub mod schema;
pub mod weak_format;

use std::sync::Arc;

use serde_json::Value;

use crate::context::{ReviewSubject, Violation};
use crate::error::GovernanceError;
use crate::manifest::{CheckId, GovernanceManifest};
use crate::schema::PlanSchema;

pub use dag::DagCheck;
pub use invariant::InvariantPresenceCheck;
pub use reference::{ReferenceCheck, IDENTIFIER_PATTERN};
pub use schema::SchemaCheck;
pub use weak_format::WeakFormatCheck;

/// A deterministic, pure admissibility rule.
pub trait ReviewerCheck: Send + Sync {
    fn check_id(&self) -> CheckId;

    /// Plan sections this check guards. They become locked when the check
    /// passes and no violation touches them.
    fn sections(&self) -> Vec<String>;

    /// Gating checks run first; when one fails nothing else runs.
    fn is_gating(&self) -> bool {
        false
    }

    /// Structured description of the rule, folded into the governance hash.
    fn definition(&self) -> Value;

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation>;
}

/// Instantiate the enabled checks in execution order.
pub fn build_checks(
    manifest: &GovernanceManifest,
    schema: &PlanSchema,
) -> Result<Vec<Arc<dyn ReviewerCheck>>, GovernanceError> {
    let mut checks: Vec<Arc<dyn ReviewerCheck>> = Vec::new();
    for id in CheckId::ALL {
        if !manifest.is_enabled(id) {
            continue;
        }
        let check: Arc<dyn ReviewerCheck> = match id {
            CheckId::Schema => Arc::new(SchemaCheck::new(schema)?),
            CheckId::InvariantPresence => Arc::new(InvariantPresenceCheck::new()),
            CheckId::Reference => Arc::new(ReferenceCheck::new()?),
            CheckId::Dag => Arc::new(DagCheck::new(manifest.max_errors)),
            CheckId::WeakFormat => Arc::new(WeakFormatCheck::new(manifest)?),
        };
        checks.push(check);
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_checks_in_execution_order() {
        let mut manifest = GovernanceManifest::default();
        manifest.enabled_checks = vec![CheckId::Dag, CheckId::Schema];
        let checks = build_checks(&manifest, &PlanSchema::embedded().unwrap()).unwrap();
        let ids: Vec<_> = checks.iter().map(|c| c.check_id()).collect();
        assert_eq!(ids, vec![CheckId::Schema, CheckId::Dag]);
        assert!(checks[0].is_gating());
        assert!(!checks[1].is_gating());
    }

    #[test]
    fn definitions_name_their_check() {
        let manifest = GovernanceManifest::default();
        for check in build_checks(&manifest, &PlanSchema::embedded().unwrap()).unwrap() {
            assert_eq!(
                check.definition()["check_id"],
                Value::String(check.check_id().to_string())
            );
        }
    }
}
