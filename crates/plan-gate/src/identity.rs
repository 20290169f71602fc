use plan_gate_canonical::{digest, CanonicalError, Digest};
use serde_json::json;

use crate::error::GovernanceError;
use crate::gate::ReviewerGate;
use crate::schema::PlanSchema;

/// The governance identity of a running engine.
///
/// `governance_version` is the digest of the canonical form of
/// `{"checks": <check definitions>, "schema": <plan schema>, "manifest": <manifest>}`.
/// It is stamped on every event, so any change to the rules, the schema or the
/// configuration is visible in the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GovernanceIdentity {
    pub governance_version: Digest,
    pub schema_version: String,
    pub manifest_digest: Digest,
}

impl GovernanceIdentity {
    pub fn compute(gate: &ReviewerGate, schema: &PlanSchema) -> Result<Self, GovernanceError> {
        let manifest = serde_json::to_value(gate.manifest())
            .map_err(|e| CanonicalError::Serialization(e.to_string()))?;
        let manifest_digest = digest(&manifest)?;
        let governance_version = digest(&json!({
            "checks": gate.definitions(),
            "schema": schema.document(),
            "manifest": manifest,
        }))?;
        Ok(Self {
            governance_version,
            schema_version: schema.version(),
            manifest_digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::contract::ArchitectureContract;
    use crate::manifest::{CheckId, GovernanceManifest};

    fn identity(manifest: GovernanceManifest, schema: &PlanSchema) -> GovernanceIdentity {
        let gate = ReviewerGate::new(
            Arc::new(manifest),
            Arc::new(ArchitectureContract::empty()),
            schema,
        )
        .unwrap();
        GovernanceIdentity::compute(&gate, schema).unwrap()
    }

    #[test]
    fn stable_across_computations() {
        let schema = PlanSchema::embedded().unwrap();
        assert_eq!(
            identity(GovernanceManifest::default(), &schema),
            identity(GovernanceManifest::default(), &schema)
        );
    }

    #[test]
    fn sensitive_to_manifest_changes() {
        let schema = PlanSchema::embedded().unwrap();
        let base = identity(GovernanceManifest::default(), &schema);

        let mut fewer_errors = GovernanceManifest::default();
        fewer_errors.max_errors = 3;
        assert_ne!(identity(fewer_errors, &schema).governance_version, base.governance_version);

        let mut no_dag = GovernanceManifest::default();
        no_dag.enabled_checks.retain(|id| *id != CheckId::Dag);
        assert_ne!(identity(no_dag, &schema).governance_version, base.governance_version);

        let mut pattern = GovernanceManifest::default();
        pattern
            .weak_format_fields
            .insert("fields.package_name".into(), "^[a-z]+$".into());
        assert_ne!(identity(pattern, &schema).governance_version, base.governance_version);
    }

    #[test]
    fn sensitive_to_schema_changes() {
        let schema = PlanSchema::embedded().unwrap();
        let mut edited = schema.document().clone();
        edited["title"] = json!("Architecture Plan v2");
        let edited = PlanSchema::from_json_str(&edited.to_string()).unwrap();

        let a = identity(GovernanceManifest::default(), &schema);
        let b = identity(GovernanceManifest::default(), &edited);
        assert_ne!(a.governance_version, b.governance_version);
        assert_ne!(a.schema_version, b.schema_version);
        assert_eq!(a.manifest_digest, b.manifest_digest);
    }
}
