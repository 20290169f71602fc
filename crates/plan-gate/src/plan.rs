//! Typed view of a plan document and its lifecycle.

use std::collections::BTreeMap;

use plan_gate_canonical::Digest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GovernanceError;

/// A machine-produced execution plan.
///
/// Only built after the plan passed schema validation; the raw document stays
/// the source of truth for hashing and section locking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub project_name: String,
    pub schema_version: String,
    #[serde(default)]
    pub entities: Vec<String>,
    pub invariants: Vec<Invariant>,
    pub assumptions: BTreeMap<String, String>,
    pub build_dag: BuildDag,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A fact the plan asserts about an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invariant {
    pub entity: String,
    pub predicate_key: String,
    pub value: Value,
    pub domain: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildDag {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

/// An identifier used by the plan that must resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference<'a> {
    pub token: &'a str,
    /// Section the token lives in.
    pub section: &'static str,
    /// Location inside the document, e.g. `invariants[2].entity`.
    pub location: String,
}

impl Plan {
    pub fn from_document(document: &Value) -> Result<Self, serde_json::Error> {
        Plan::deserialize(document)
    }

    /// Every invariant entity, then every DAG node, in document order.
    pub fn references(&self) -> Vec<Reference<'_>> {
        let invariant_refs = self.invariants.iter().enumerate().map(|(i, inv)| Reference {
            token: inv.entity.as_str(),
            section: "invariants",
            location: format!("invariants[{i}].entity"),
        });
        let node_refs = self.build_dag.nodes.iter().enumerate().map(|(i, node)| Reference {
            token: node.as_str(),
            section: "build_dag",
            location: format!("build_dag.nodes[{i}]"),
        });
        invariant_refs.chain(node_refs).collect()
    }
}

/// Value of a top-level section of the raw document, `null` when absent.
pub fn section_value<'a>(document: &'a Value, section: &str) -> &'a Value {
    document.get(section).unwrap_or(&Value::Null)
}

/// Ledger key grouping a plan with its retry.
///
/// Documents without a usable `plan_id` get an identity derived from their own
/// content, so an anonymous retry is only recognized when byte-identical. The
/// schema rejects every such `plan_id`, so these lineages never freeze.
pub fn lineage_id(document: &Value, plan_hash: &Digest) -> String {
    match document.get("plan_id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => anonymous_lineage(plan_hash),
    }
}

pub fn anonymous_lineage(plan_hash: &Digest) -> String {
    format!("anonymous-{}", &plan_hash.to_hex()[..16])
}

/// Plan lifecycle. Transitions are one-way out of `Draft`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    Draft,
    Frozen,
    Rejected,
}

impl PlanState {
    pub fn can_transition_to(self, next: PlanState) -> bool {
        matches!(
            (self, next),
            (PlanState::Draft, PlanState::Frozen) | (PlanState::Draft, PlanState::Rejected)
        )
    }

    pub fn transition(self, next: PlanState) -> Result<PlanState, GovernanceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(GovernanceError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, PlanState::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "plan_id": "checkout",
            "project_name": "Checkout",
            "schema_version": "0".repeat(64),
            "entities": ["backend"],
            "invariants": [
                {"entity": "backend", "predicate_key": "port", "value": 8080, "domain": "env_vars"}
            ],
            "assumptions": {"authentication": "OIDC"},
            "build_dag": {"nodes": ["backend", "frontend"], "edges": [["frontend", "backend"]]}
        })
    }

    #[test]
    fn builds_typed_plan() {
        let plan = Plan::from_document(&document()).unwrap();
        assert_eq!(plan.build_dag.edges, vec![("frontend".into(), "backend".into())]);
        assert!(plan.fields.is_empty());
    }

    #[test]
    fn references_cover_invariants_then_nodes() {
        let plan = Plan::from_document(&document()).unwrap();
        let refs: Vec<_> = plan.references().iter().map(|r| r.location.clone()).collect();
        assert_eq!(
            refs,
            vec!["invariants[0].entity", "build_dag.nodes[0]", "build_dag.nodes[1]"]
        );
    }

    #[test]
    fn lineage_prefers_plan_id() {
        let hash = plan_gate_canonical::digest(&document()).unwrap();
        assert_eq!(lineage_id(&document(), &hash), "checkout");

        let anonymous = json!({"plan_id": "  "});
        let lineage = lineage_id(&anonymous, &hash);
        assert!(lineage.starts_with("anonymous-"));
        assert_eq!(lineage.len(), "anonymous-".len() + 16);
    }

    #[test]
    fn section_value_defaults_to_null() {
        assert_eq!(section_value(&document(), "fields"), &Value::Null);
        assert_eq!(section_value(&document(), "entities"), &json!(["backend"]));
    }

    #[test]
    fn lifecycle_is_one_way() {
        assert_eq!(PlanState::Draft.transition(PlanState::Frozen).unwrap(), PlanState::Frozen);
        assert!(PlanState::Frozen.transition(PlanState::Draft).is_err());
        assert!(PlanState::Rejected.transition(PlanState::Frozen).is_err());
        assert!(PlanState::Frozen.is_terminal());
    }
}
