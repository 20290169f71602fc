//! RG-SCHEMA-001: structural validity and schema version binding.

use jsonschema::{Draft, Validator};
use serde_json::{json, Value};
use tracing::debug;

use crate::checks::ReviewerCheck;
use crate::context::{ReviewSubject, Violation, ViolationKind};
use crate::error::GovernanceError;
use crate::manifest::CheckId;
use crate::schema::PlanSchema;

/// Section reported for structural violations.
pub const STRUCTURE_SECTION: &str = "structure";

pub struct SchemaCheck {
    validator: Validator,
    expected_version: String,
}

impl SchemaCheck {
    pub fn new(schema: &PlanSchema) -> Result<Self, GovernanceError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema.document())
            .map_err(|e| GovernanceError::SchemaDefinition(e.to_string()))?;
        Ok(Self {
            validator,
            expected_version: schema.version(),
        })
    }
}

impl ReviewerCheck for SchemaCheck {
    fn check_id(&self) -> CheckId {
        CheckId::Schema
    }

    fn sections(&self) -> Vec<String> {
        vec!["schema_version".to_string()]
    }

    fn is_gating(&self) -> bool {
        true
    }

    fn definition(&self) -> Value {
        json!({
            "check_id": self.check_id().as_str(),
            "gating": true,
            "sections": self.sections(),
            "rule": {
                "dialect": "json-schema-draft-07",
                "version_field": "schema_version",
                "version_binding": "sha256(jcs(schema))",
            },
        })
    }

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();

        let declared = subject.document.get("schema_version").and_then(Value::as_str);
        if declared != Some(self.expected_version.as_str()) {
            violations.push(Violation::new(
                CheckId::Schema,
                ViolationKind::SchemaInvalid,
                "schema_version",
                format!(
                    "Version mismatch. Expected {}, got {}",
                    self.expected_version,
                    declared.unwrap_or("<missing>")
                ),
            ));
        }

        for error in self.validator.iter_errors(subject.document) {
            let pointer = error.instance_path.to_string();
            let reference = if pointer.is_empty() { "/".to_string() } else { pointer };
            violations.push(
                Violation::new(
                    CheckId::Schema,
                    ViolationKind::SchemaInvalid,
                    STRUCTURE_SECTION,
                    format!("Structure error: {error}"),
                )
                .with_reference(reference),
            );
        }

        debug!(violations = violations.len(), "Schema check evaluated");
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ArchitectureContract;
    use crate::fixtures::valid_document;
    use crate::manifest::GovernanceManifest;

    fn run(document: &Value) -> Vec<Violation> {
        let check = SchemaCheck::new(&PlanSchema::embedded().unwrap()).unwrap();
        let manifest = GovernanceManifest::default();
        let contract = ArchitectureContract::empty();
        check.evaluate(&ReviewSubject {
            document,
            plan: None,
            contract: &contract,
            manifest: &manifest,
        })
    }

    #[test]
    fn valid_document_passes() {
        assert!(run(&valid_document()).is_empty());
    }

    #[test]
    fn version_mismatch_is_reported_alone() {
        let mut doc = valid_document();
        doc["schema_version"] = Value::String("a".repeat(64));
        let violations = run(&doc);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].section, "schema_version");
        assert!(violations[0].message.starts_with("Version mismatch"));
    }

    #[test]
    fn structural_errors_carry_pointers() {
        let mut doc = valid_document();
        doc["build_dag"]["edges"] = serde_json::json!([["only-one"]]);
        let violations = run(&doc);
        assert!(!violations.is_empty());
        assert!(violations.iter().all(|v| v.section == STRUCTURE_SECTION));
        assert!(violations
            .iter()
            .any(|v| v.reference.as_deref() == Some("/build_dag/edges/0")));
    }

    #[test]
    fn missing_required_section_fails() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("invariants");
        let violations = run(&doc);
        assert!(violations.iter().any(|v| v.reference.as_deref() == Some("/")));
    }

    #[test]
    fn non_object_document_fails() {
        let violations = run(&serde_json::json!([1, 2, 3]));
        assert!(violations.iter().any(|v| v.section == "schema_version"));
        assert!(violations.iter().any(|v| v.section == STRUCTURE_SECTION));
    }

    #[test]
    fn plan_id_must_be_an_identifier() {
        for bad in [" ", "", "check out", "a/b"] {
            let mut doc = valid_document();
            doc["plan_id"] = Value::String(bad.to_string());
            let violations = run(&doc);
            assert!(
                violations
                    .iter()
                    .any(|v| v.reference.as_deref() == Some("/plan_id")),
                "plan_id {bad:?} accepted"
            );
        }
    }
}
