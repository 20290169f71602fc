//! Governance events: the only outputs of an evaluation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use plan_gate_canonical::Digest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RejectionEntry;
use crate::contradiction::Contradiction;

/// Process exit code for an admissible plan.
pub const EXIT_ADMISSIBLE: i32 = 0;
/// Process exit code for either rejection event.
pub const EXIT_REJECTED: i32 = 1;
/// Process exit code for an internal fault.
pub const EXIT_FAULT: i32 = 2;

pub const REMEDIATION_RETRY: &str =
    "Correct the reported errors and resubmit once. Locked sections must not change.";
pub const REMEDIATION_EXHAUSTED: &str =
    "Retry budget exhausted. This lineage will not be granted execution authority.";
pub const REMEDIATION_FROZEN: &str =
    "Lineage already frozen with a different plan. Submit changes under a new plan_id.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum GovernanceEvent {
    #[serde(rename = "PLAN_FROZEN")]
    PlanFrozen(FrozenRecord),
    #[serde(rename = "PLAN_REJECTED")]
    PlanRejected(RejectionRecord),
    #[serde(rename = "FAILURE_RETRY_EXHAUSTED")]
    FailureRetryExhausted(RejectionRecord),
}

/// Record of a plan granted execution authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrozenRecord {
    pub timestamp: DateTime<Utc>,
    pub lineage: String,
    pub plan_hash: Digest,
    /// The frozen plan as submitted; its canonical digest is `plan_hash`.
    pub plan: Value,
    pub governance_version: Digest,
    pub schema_version: String,
    pub attempt: u32,
    pub authority_granted: bool,
}

/// Record of a rejected submission. Never carries authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub timestamp: DateTime<Utc>,
    pub lineage: String,
    pub plan_hash: Digest,
    /// The rejected plan, unmodified. Text that never parsed is kept as a
    /// JSON string, and `plan_hash` is then the digest of its raw bytes.
    pub plan: Value,
    pub governance_version: Digest,
    pub attempt: u32,
    pub authority_granted: bool,
    pub retry_permitted: bool,
    pub error_count: usize,
    pub errors: Vec<RejectionEntry>,
    /// Section name to canonical digest of its content at rejection time.
    pub locked_sections: BTreeMap<String, Digest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contradictions: Vec<Contradiction>,
    pub remediation: String,
}

impl GovernanceEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            GovernanceEvent::PlanFrozen(_) => "PLAN_FROZEN",
            GovernanceEvent::PlanRejected(_) => "PLAN_REJECTED",
            GovernanceEvent::FailureRetryExhausted(_) => "FAILURE_RETRY_EXHAUSTED",
        }
    }

    pub fn authority_granted(&self) -> bool {
        matches!(self, GovernanceEvent::PlanFrozen(r) if r.authority_granted)
    }

    pub fn lineage(&self) -> &str {
        match self {
            GovernanceEvent::PlanFrozen(r) => &r.lineage,
            GovernanceEvent::PlanRejected(r) | GovernanceEvent::FailureRetryExhausted(r) => {
                &r.lineage
            }
        }
    }

    pub fn plan_hash(&self) -> Digest {
        match self {
            GovernanceEvent::PlanFrozen(r) => r.plan_hash,
            GovernanceEvent::PlanRejected(r) | GovernanceEvent::FailureRetryExhausted(r) => {
                r.plan_hash
            }
        }
    }

    pub fn plan(&self) -> &Value {
        match self {
            GovernanceEvent::PlanFrozen(r) => &r.plan,
            GovernanceEvent::PlanRejected(r) | GovernanceEvent::FailureRetryExhausted(r) => {
                &r.plan
            }
        }
    }

    pub fn governance_version(&self) -> Digest {
        match self {
            GovernanceEvent::PlanFrozen(r) => r.governance_version,
            GovernanceEvent::PlanRejected(r) | GovernanceEvent::FailureRetryExhausted(r) => {
                r.governance_version
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            GovernanceEvent::PlanFrozen(_) => EXIT_ADMISSIBLE,
            _ => EXIT_REJECTED,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, GovernanceEvent::PlanFrozen(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_gate_canonical::digest_bytes;
    use serde_json::json;

    fn rejection() -> RejectionRecord {
        RejectionRecord {
            timestamp: Utc::now(),
            lineage: "checkout".into(),
            plan_hash: digest_bytes(b"plan"),
            plan: json!({"plan_id": "checkout"}),
            governance_version: digest_bytes(b"governance"),
            attempt: 0,
            authority_granted: false,
            retry_permitted: true,
            error_count: 1,
            errors: vec![RejectionEntry {
                check_id: "RG-DAG-004".into(),
                section: "build_dag".into(),
                message: "Cycle detected involving node 'A' (A -> B -> A)".into(),
                reference: Some("A".into()),
            }],
            locked_sections: BTreeMap::from([("fields".to_string(), digest_bytes(b"{}"))]),
            contradictions: Vec::new(),
            remediation: REMEDIATION_RETRY.into(),
        }
    }

    #[test]
    fn serializes_with_event_type_tag() {
        let event = GovernanceEvent::PlanRejected(rejection());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "PLAN_REJECTED");
        assert_eq!(value["authority_granted"], false);
        assert_eq!(value["errors"][0]["check_id"], "RG-DAG-004");
        assert!(value.get("contradictions").is_none());
        assert!(matches!(value["locked_sections"]["fields"], Value::String(_)));
        assert_eq!(value["plan"]["plan_id"], "checkout");

        let back: GovernanceEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn only_frozen_events_grant_authority() {
        let rejected = GovernanceEvent::FailureRetryExhausted(rejection());
        assert!(!rejected.authority_granted());
        assert_eq!(rejected.exit_code(), EXIT_REJECTED);
        assert_eq!(rejected.event_type(), "FAILURE_RETRY_EXHAUSTED");

        let frozen = GovernanceEvent::PlanFrozen(FrozenRecord {
            timestamp: Utc::now(),
            lineage: "checkout".into(),
            plan_hash: digest_bytes(b"plan"),
            plan: json!({"plan_id": "checkout"}),
            governance_version: digest_bytes(b"governance"),
            schema_version: "0".repeat(64),
            attempt: 0,
            authority_granted: true,
        });
        assert!(frozen.authority_granted());
        assert_eq!(frozen.exit_code(), EXIT_ADMISSIBLE);
    }
}
