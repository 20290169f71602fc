//! RG-WEAK-FORMAT-005: field-scoped regex validation.
//!
//! Only the paths the manifest lists are inspected. A path is dotted, and a
//! `*` segment matches every key of an object or every index of an array.
//! Absent fields pass; a present field that is not a string fails.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::checks::ReviewerCheck;
use crate::context::{ReviewSubject, Violation, ViolationKind};
use crate::error::GovernanceError;
use crate::manifest::{CheckId, GovernanceManifest, WeakFormatRule};

pub struct WeakFormatCheck {
    rules: Vec<WeakFormatRule>,
}

impl WeakFormatCheck {
    pub fn new(manifest: &GovernanceManifest) -> Result<Self, GovernanceError> {
        Ok(Self {
            rules: manifest.weak_format_rules()?,
        })
    }
}

/// Every value addressed by `segments`, with its concrete dotted path.
pub fn resolve_path<'a>(document: &'a Value, segments: &[String]) -> Vec<(String, &'a Value)> {
    let mut frontier: Vec<(String, &Value)> = vec![(String::new(), document)];
    for segment in segments {
        let mut next = Vec::new();
        for (prefix, value) in frontier {
            let join = |key: &str| {
                if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                }
            };
            match (value, segment.as_str()) {
                (Value::Object(map), "*") => {
                    next.extend(map.iter().map(|(k, v)| (join(k), v)));
                }
                (Value::Array(items), "*") => {
                    next.extend(items.iter().enumerate().map(|(i, v)| (join(&i.to_string()), v)));
                }
                (Value::Object(map), key) => {
                    if let Some(v) = map.get(key) {
                        next.push((join(key), v));
                    }
                }
                (Value::Array(items), key) => {
                    if let Some(v) = key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                        next.push((join(key), v));
                    }
                }
                _ => {}
            }
        }
        frontier = next;
    }
    frontier
}

impl ReviewerCheck for WeakFormatCheck {
    fn check_id(&self) -> CheckId {
        CheckId::WeakFormat
    }

    fn sections(&self) -> Vec<String> {
        let sections: BTreeSet<&str> = self
            .rules
            .iter()
            .filter_map(|rule| rule.segments.first().map(String::as_str))
            .collect();
        sections.into_iter().map(String::from).collect()
    }

    fn definition(&self) -> Value {
        let fields: serde_json::Map<String, Value> = self
            .rules
            .iter()
            .map(|rule| (rule.path.clone(), Value::String(rule.pattern.as_str().to_string())))
            .collect();
        json!({
            "check_id": self.check_id().as_str(),
            "gating": false,
            "sections": self.sections(),
            "rule": {
                "fields": fields,
                "wildcard": "*",
                "absent": "pass",
                "non_string": "fail",
            },
        })
    }

    fn evaluate(&self, subject: &ReviewSubject<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let section = rule.segments.first().cloned().unwrap_or_default();
            for (path, value) in resolve_path(subject.document, &rule.segments) {
                let message = match value {
                    Value::String(s) if rule.pattern.is_match(s) => continue,
                    Value::String(s) => format!(
                        "Field '{path}' value '{s}' does not match {}",
                        rule.pattern.as_str()
                    ),
                    other => format!("Field '{path}' must be a string, got {other}"),
                };
                violations.push(
                    Violation::new(
                        CheckId::WeakFormat,
                        ViolationKind::WeakFormatMismatch,
                        section.clone(),
                        message,
                    )
                    .with_reference(path),
                );
            }
        }
        violations
    }
}
