//! The governance manifest: which checks are enabled and how they are
//! parameterized.
//!
//! The manifest is loaded once per process and then shared read-only behind an
//! `Arc`. Every rule the manifest can express is validated at load time so a
//! broken manifest is a startup fault, never a plan rejection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use plan_gate_canonical::{digest, parse_strict, Digest};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ManifestError;
use crate::schema::PlanSchema;

/// The only retry budget the gate supports.
pub const RETRY_BUDGET: u32 = 1;

/// Default cap on the number of errors reported in a rejection.
pub const DEFAULT_MAX_ERRORS: usize = 5;

/// Identifier of a reviewer gate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckId {
    #[serde(rename = "RG-SCHEMA-001")]
    Schema,
    #[serde(rename = "RG-INVARIANT-002")]
    InvariantPresence,
    #[serde(rename = "RG-REFERENCE-003")]
    Reference,
    #[serde(rename = "RG-DAG-004")]
    Dag,
    #[serde(rename = "RG-WEAK-FORMAT-005")]
    WeakFormat,
}

impl CheckId {
    /// Every known check, in execution order.
    pub const ALL: [CheckId; 5] = [
        CheckId::Schema,
        CheckId::InvariantPresence,
        CheckId::Reference,
        CheckId::Dag,
        CheckId::WeakFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckId::Schema => "RG-SCHEMA-001",
            CheckId::InvariantPresence => "RG-INVARIANT-002",
            CheckId::Reference => "RG-REFERENCE-003",
            CheckId::Dag => "RG-DAG-004",
            CheckId::WeakFormat => "RG-WEAK-FORMAT-005",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckId {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ManifestError::Malformed(format!("unknown check id '{s}'")))
    }
}

/// Governance configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernanceManifest {
    pub enabled_checks: Vec<CheckId>,
    pub required_invariant_domains: Vec<String>,
    /// Assumption keys that must be answered with a non-blank value.
    #[serde(default)]
    pub required_assumption_categories: Vec<String>,
    /// Dotted field path (`*` matches any key or index) to regex.
    #[serde(default)]
    pub weak_format_fields: BTreeMap<String, String>,
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
}

fn default_retry_budget() -> u32 {
    RETRY_BUDGET
}

fn default_max_errors() -> usize {
    DEFAULT_MAX_ERRORS
}

impl Default for GovernanceManifest {
    fn default() -> Self {
        let weak_format_fields = [
            (
                "fields.repository_url",
                r"^(?:[a-z][a-z0-9+.-]*://[\w.-]+|N/A).*",
            ),
            ("fields.module_path", r"^[a-zA-Z0-9_.]+$"),
            ("fields.package_name", r"^[a-zA-Z0-9_-]+$"),
        ]
        .into_iter()
        .map(|(path, pattern)| (path.to_string(), pattern.to_string()))
        .collect();

        Self {
            enabled_checks: CheckId::ALL.to_vec(),
            required_invariant_domains: [
                "api_contracts",
                "data_schemas",
                "env_vars",
                "build_dependencies",
                "auth_model",
                "persistence_model",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            required_assumption_categories: [
                "authentication",
                "authorization",
                "deployment_scope",
                "data_retention",
                "scaling_model",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            weak_format_fields,
            retry_budget: RETRY_BUDGET,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

/// A weak-format rule with its path split and its pattern compiled.
#[derive(Clone, Debug)]
pub struct WeakFormatRule {
    pub path: String,
    pub segments: Vec<String>,
    pub pattern: Regex,
}

impl GovernanceManifest {
    /// Load a manifest from disk, optionally verifying it against a sealed digest.
    ///
    /// The seal is computed over the canonical form of the document as written,
    /// so `run-governance canonicalize` prints the value to pin.
    pub fn load(path: impl AsRef<Path>, seal: Option<&Digest>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = parse_strict(&text)?;

        let actual = digest(&document)?;
        if let Some(expected) = seal {
            if *expected != actual {
                return Err(ManifestError::SealMismatch {
                    expected: *expected,
                    actual,
                });
            }
        }

        let manifest = Self::from_value(document)?;
        info!(
            path = %path.display(),
            digest = %actual,
            checks = manifest.enabled_checks.len(),
            "Governance manifest loaded"
        );
        Ok(manifest)
    }

    /// Parse manifest text (duplicate keys rejected) and validate it.
    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        Self::from_value(parse_strict(text)?)
    }

    pub fn from_value(document: Value) -> Result<Self, ManifestError> {
        let manifest: Self =
            serde_json::from_value(document).map_err(|e| ManifestError::Malformed(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check every rule the manifest must satisfy.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.retry_budget != RETRY_BUDGET {
            return Err(ManifestError::RetryBudget(self.retry_budget));
        }
        if self.max_errors == 0 {
            return Err(ManifestError::MaxErrors);
        }

        let mut checks = BTreeSet::new();
        for id in &self.enabled_checks {
            if !checks.insert(*id) {
                return Err(ManifestError::DuplicateCheck(id.to_string()));
            }
        }

        let mut domains = BTreeSet::new();
        for domain in &self.required_invariant_domains {
            if !domains.insert(domain.as_str()) {
                return Err(ManifestError::DuplicateDomain(domain.clone()));
            }
        }

        self.validate_field_sections()?;
        self.weak_format_rules()?;
        debug!("Manifest validated");
        Ok(())
    }

    /// Every weak-format path must address a section the plan schema declares.
    fn validate_field_sections(&self) -> Result<(), ManifestError> {
        let schema = PlanSchema::embedded().map_err(|e| ManifestError::Malformed(e.to_string()))?;
        for field in self.weak_format_fields.keys() {
            let section = field.split('.').next().unwrap_or_default();
            if section == "*" || !schema.declares_section(section) {
                return Err(ManifestError::PhantomSection {
                    field: field.clone(),
                    section: section.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Compile the weak-format rules in path order.
    pub fn weak_format_rules(&self) -> Result<Vec<WeakFormatRule>, ManifestError> {
        self.weak_format_fields
            .iter()
            .map(|(path, pattern)| {
                let compiled = Regex::new(pattern).map_err(|e| ManifestError::InvalidPattern {
                    field: path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(WeakFormatRule {
                    path: path.clone(),
                    segments: path.split('.').map(String::from).collect(),
                    pattern: compiled,
                })
            })
            .collect()
    }

    pub fn is_enabled(&self, id: CheckId) -> bool {
        self.enabled_checks.contains(&id)
    }

    /// Canonical digest of the resolved manifest.
    pub fn digest(&self) -> Result<Digest, ManifestError> {
        Ok(plan_gate_canonical::digest_serializable(self)?)
    }
}
