//! The embedded plan schema and its version binding.
//!
//! A plan declares the schema it was written against through `schema_version`,
//! the hex SHA-256 of the schema's canonical form. Editing the schema file
//! therefore invalidates every plan written against the previous revision.

use plan_gate_canonical::{digest, parse_strict, Digest};
use serde_json::Value;

use crate::error::GovernanceError;

const PLAN_SCHEMA_SOURCE: &str = include_str!("../schema/plan.schema.json");

/// The plan schema document plus its canonical digest.
#[derive(Clone, Debug)]
pub struct PlanSchema {
    document: Value,
    digest: Digest,
}

impl PlanSchema {
    /// Load the schema compiled into this crate.
    pub fn embedded() -> Result<Self, GovernanceError> {
        Self::from_json_str(PLAN_SCHEMA_SOURCE)
    }

    pub fn from_json_str(source: &str) -> Result<Self, GovernanceError> {
        let document = parse_strict(source)?;
        if !document.is_object() {
            return Err(GovernanceError::SchemaDefinition(
                "schema document must be a JSON object".into(),
            ));
        }
        let digest = digest(&document)?;
        Ok(Self { document, digest })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Value a conforming plan must carry in `schema_version`.
    pub fn version(&self) -> String {
        self.digest.to_hex()
    }

    /// Top-level plan sections the schema declares.
    pub fn sections(&self) -> Vec<String> {
        self.document
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn declares_section(&self, section: &str) -> bool {
        self.document
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(section))
    }
}
