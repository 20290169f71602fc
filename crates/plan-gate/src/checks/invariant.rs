//! RG-INVARIANT-002: every required domain carries a non-empty invariant.
//!
//! Emptiness is mechanical. A whitespace-only string, an empty object or
//! array, and `null` are empty; every number and boolean is not. Whether a
//! value is meaningful is not this check's business.

use serde_json::{json, Value};

use crate::checks::ReviewerCheck;
use crate::context::{ReviewSubject, Violation, ViolationKind};
use crate::manifest::CheckId;

#[derive(Debug, Default)]
pub struct InvariantPresenceCheck;

impl InvariantPresenceCheck {
    pub fn new() -> Self {
        Self
    }
}

/// Whether a value counts as present.
pub fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

impl ReviewerCheck for InvariantPresenceCheck {
    fn check_id(&self) -> CheckId {
        CheckId::InvariantPresence
    }

    fn sections(&self) -> Vec<String> {
        vec!["invariants".to_string(), "assumptions".to_string()]
    }

    fn definition(&self) -> Value {
        json!({
            "check_id": self.check_id().as_str(),
            "gating": false,
            "sections": self.sections(),
            "rule": {
                "domains": "manifest.required_invariant_domains",
                "assumptions": "manifest.required_assumption_categories",
                "non_empty": {
                    "null": false,
                    "string": "trimmed length >= 1",
                    "array": "length >= 1",
                    "object": "keys >= 1",
                    "number": true,
                    "boolean": true,
                },
            },
        })
    }

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation> {
        let Some(plan) = subject.plan else {
            return Vec::new();
        };
        let mut violations = Vec::new();

        for domain in &subject.manifest.required_invariant_domains {
            let satisfied = plan
                .invariants
                .iter()
                .any(|inv| &inv.domain == domain && is_non_empty(&inv.value));
            if !satisfied {
                violations.push(
                    Violation::new(
                        CheckId::InvariantPresence,
                        ViolationKind::InvariantDomainEmpty,
                        "invariants",
                        format!("Missing non-empty invariant for required domain '{domain}'"),
                    )
                    .with_reference(domain.clone()),
                );
            }
        }

        for category in &subject.manifest.required_assumption_categories {
            let answered = plan
                .assumptions
                .get(category)
                .is_some_and(|answer| !answer.trim().is_empty());
            if !answered {
                violations.push(
                    Violation::new(
                        CheckId::InvariantPresence,
                        ViolationKind::InvariantDomainEmpty,
                        "assumptions",
                        format!("Missing assumption for required category '{category}'"),
                    )
                    .with_reference(category.clone()),
                );
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ArchitectureContract;
    use crate::fixtures::valid_document;
    use crate::manifest::GovernanceManifest;
    use crate::plan::Plan;

    fn run(document: &Value, manifest: &GovernanceManifest) -> Vec<Violation> {
        let plan = Plan::from_document(document).unwrap();
        let contract = ArchitectureContract::empty();
        InvariantPresenceCheck::new().evaluate(&ReviewSubject {
            document,
            plan: Some(&plan),
            contract: &contract,
            manifest,
        })
    }

    #[test]
    fn emptiness_is_mechanical() {
        assert!(!is_non_empty(&Value::Null));
        assert!(!is_non_empty(&json!("   ")));
        assert!(!is_non_empty(&json!([])));
        assert!(!is_non_empty(&json!({})));
        assert!(is_non_empty(&json!(0)));
        assert!(is_non_empty(&json!(false)));
        assert!(is_non_empty(&json!("x")));
        assert!(is_non_empty(&json!([null])));
    }

    #[test]
    fn complete_plan_passes() {
        assert!(run(&valid_document(), &GovernanceManifest::default()).is_empty());
    }

    #[test]
    fn blank_value_does_not_satisfy_domain() {
        let mut doc = valid_document();
        for inv in doc["invariants"].as_array_mut().unwrap() {
            if inv["domain"] == "auth_model" {
                inv["value"] = json!("  ");
            }
        }
        let violations = run(&doc, &GovernanceManifest::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::InvariantDomainEmpty);
        assert_eq!(violations[0].reference.as_deref(), Some("auth_model"));
    }

    #[test]
    fn one_violation_per_missing_domain() {
        let mut doc = valid_document();
        doc["invariants"] = json!([]);
        let manifest = GovernanceManifest::default();
        let violations = run(&doc, &manifest);
        assert_eq!(violations.len(), manifest.required_invariant_domains.len());
        assert!(violations.iter().all(|v| v.section == "invariants"));
    }

    #[test]
    fn required_assumptions_must_be_answered() {
        let mut doc = valid_document();
        doc["assumptions"]
            .as_object_mut()
            .unwrap()
            .remove("data_retention");
        doc["assumptions"]["scaling_model"] = json!(" ");
        let violations = run(&doc, &GovernanceManifest::default());
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.section == "assumptions"));
        assert_eq!(violations[0].reference.as_deref(), Some("data_retention"));
        assert_eq!(violations[1].reference.as_deref(), Some("scaling_model"));
    }
}
