//! RG-REFERENCE-003: every identifier the plan uses resolves.
//!
//! Resolution is byte-exact against the contract's entities and nodes plus the
//! identifiers the plan itself declares. There is no case folding, trimming or
//! fuzzy matching; the reported reference is the offending token verbatim.

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{json, Value};

use crate::checks::ReviewerCheck;
use crate::context::{ReviewSubject, Violation, ViolationKind};
use crate::error::{GovernanceError, ManifestError};
use crate::manifest::CheckId;

/// Grammar every identifier must satisfy.
pub const IDENTIFIER_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";

pub struct ReferenceCheck {
    grammar: Regex,
}

impl ReferenceCheck {
    pub fn new() -> Result<Self, GovernanceError> {
        let grammar = Regex::new(IDENTIFIER_PATTERN).map_err(|e| {
            GovernanceError::Manifest(ManifestError::InvalidPattern {
                field: "identifier".into(),
                reason: e.to_string(),
            })
        })?;
        Ok(Self { grammar })
    }

    fn syntax_violation(&self, section: &str, location: &str, token: &str) -> Violation {
        Violation::new(
            CheckId::Reference,
            ViolationKind::InvalidReferenceSyntax,
            section,
            format!("Identifier '{token}' at {location} does not match {IDENTIFIER_PATTERN}"),
        )
        .with_reference(token)
    }
}

impl ReviewerCheck for ReferenceCheck {
    fn check_id(&self) -> CheckId {
        CheckId::Reference
    }

    fn sections(&self) -> Vec<String> {
        vec!["entities".to_string()]
    }

    fn definition(&self) -> Value {
        json!({
            "check_id": self.check_id().as_str(),
            "gating": false,
            "sections": self.sections(),
            "rule": {
                "references": ["invariants[*].entity", "build_dag.nodes[*]"],
                "universe": ["contract.entities", "contract.nodes", "plan.entities"],
                "match": "byte-exact",
                "identifier_grammar": IDENTIFIER_PATTERN,
            },
        })
    }

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation> {
        let Some(plan) = subject.plan else {
            return Vec::new();
        };
        let mut violations = Vec::new();

        for (i, declared) in plan.entities.iter().enumerate() {
            if !self.grammar.is_match(declared) {
                violations.push(self.syntax_violation(
                    "entities",
                    &format!("entities[{i}]"),
                    declared,
                ));
            }
        }

        let declared: BTreeSet<&str> = plan.entities.iter().map(String::as_str).collect();
        for reference in plan.references() {
            if !self.grammar.is_match(reference.token) {
                violations.push(self.syntax_violation(
                    reference.section,
                    &reference.location,
                    reference.token,
                ));
                continue;
            }
            let resolved =
                declared.contains(reference.token) || subject.contract.declares(reference.token);
            if !resolved {
                violations.push(
                    Violation::new(
                        CheckId::Reference,
                        ViolationKind::UnresolvedReference,
                        reference.section,
                        format!(
                            "Unresolved reference '{}' at {}",
                            reference.token, reference.location
                        ),
                    )
                    .with_reference(reference.token),
                );
            }
        }

        violations
    }
}
