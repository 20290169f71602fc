use std::path::PathBuf;

use plan_gate_canonical::{CanonicalError, Digest};
use thiserror::Error;

use crate::plan::PlanState;

/// Faults that abort an evaluation.
///
/// None of these is a verdict: a rejection implies a sound evaluation took
/// place, so a broken manifest, an unreadable contract or an unavailable
/// ledger surface here and never as `PLAN_REJECTED`.
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("architecture contract error: {0}")]
    Contract(String),

    #[error("plan schema definition error: {0}")]
    SchemaDefinition(String),

    #[error("canonicalization failed: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("freeze precondition violated: {0}")]
    FreezePrecondition(String),

    #[error("invalid plan state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: PlanState, to: PlanState },

    #[error("review task failed: {0}")]
    ReviewTask(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating the governance manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest is not canonical JSON: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("manifest is malformed: {0}")]
    Malformed(String),

    #[error("manifest seal mismatch: expected {expected}, found {actual}")]
    SealMismatch { expected: Digest, actual: Digest },

    #[error("retry budget is fixed at 1, manifest declares {0}")]
    RetryBudget(u32),

    #[error("max_errors must be at least 1")]
    MaxErrors,

    #[error("check {0} is listed more than once in enabled_checks")]
    DuplicateCheck(String),

    #[error("required invariant domain '{0}' is listed more than once")]
    DuplicateDomain(String),

    #[error("weak-format pattern for '{field}' does not compile: {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("weak-format field '{field}' addresses section '{section}', which the plan schema does not declare")]
    PhantomSection { field: String, section: String },
}

/// Errors from the progress ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("append conflict for lineage '{lineage}': expected {expected} entries, found {actual}")]
    Conflict {
        lineage: String,
        expected: usize,
        actual: usize,
    },

    #[error("lineage '{0}' is frozen; the ledger accepts no further entries for it")]
    AlreadyFrozen(String),

    #[error("ledger io error: {0}")]
    Io(String),

    #[error("ledger entry on line {line} is corrupt: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("could not acquire ledger lock {0}")]
    LockTimeout(PathBuf),

    #[error("lineage integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },
}
