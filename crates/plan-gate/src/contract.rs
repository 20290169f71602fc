//! The architecture contract: identifiers a plan may refer to without
//! declaring them itself.

use std::collections::BTreeSet;
use std::path::Path;

use plan_gate_canonical::parse_strict;
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// Read-only set of externally sanctioned entity and node identifiers.
///
/// An absent contract is the empty contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchitectureContract {
    #[serde(default)]
    pub entities: BTreeSet<String>,
    #[serde(default)]
    pub nodes: BTreeSet<String>,
}

impl ArchitectureContract {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, GovernanceError> {
        let document = parse_strict(text)?;
        serde_json::from_value(document).map_err(|e| GovernanceError::Contract(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GovernanceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GovernanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Byte-exact membership in either identifier set.
    pub fn declares(&self, identifier: &str) -> bool {
        self.entities.contains(identifier) || self.nodes.contains(identifier)
    }
}
