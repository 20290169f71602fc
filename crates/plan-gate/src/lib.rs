//! # Plan Gate
//!
//! A constitutional admissibility gate for machine-produced execution plans.
//! It decides, mechanically, whether a plan may be granted execution
//! authority. It never judges whether the plan is correct or useful.
//!
//! ## Reviewer gate checks
//!
//! 1. **RG-SCHEMA-001** structural validity and schema version binding (gating)
//! 2. **RG-INVARIANT-002** every required invariant domain is populated
//! 3. **RG-REFERENCE-003** every referenced identifier resolves byte-exactly
//! 4. **RG-DAG-004** the build graph is closed and acyclic
//! 5. **RG-WEAK-FORMAT-005** manifest-listed fields match their patterns
//!
//! Contradictory invariants are detected alongside and reported, but never
//! fail a plan.
//!
//! ## Lifecycle
//!
//! A failing plan gets exactly one retry. Sections that passed untouched are
//! locked by digest and must not change on the retry. A passing plan is frozen
//! by a single compare-and-append to the [`Ledger`]; that entry is the grant
//! of authority.
//!
//! ```no_run
//! use std::sync::Arc;
//! use plan_gate::{ArchitectureContract, GovernanceEngine, GovernanceManifest, InMemoryLedger};
//!
//! # async fn run(plan_text: &str) -> Result<(), plan_gate::GovernanceError> {
//! let engine = GovernanceEngine::new(
//!     Arc::new(GovernanceManifest::default()),
//!     Arc::new(ArchitectureContract::empty()),
//!     Arc::new(InMemoryLedger::new()),
//! )?;
//! let verdict = engine.submit_str(plan_text).await?;
//! std::process::exit(verdict.exit_code());
//! # }
//! ```

pub mod checks;
pub mod context;
pub mod contract;
pub mod contradiction;
pub mod engine;
pub mod error;
pub mod event;
pub mod freeze;
pub mod gate;
pub mod identity;
pub mod ledger;
pub mod manifest;
pub mod plan;
pub mod retry;
pub mod schema;

#[cfg(test)]
pub(crate) mod fixtures;

pub use checks::ReviewerCheck;
pub use context::{CheckReport, RejectionEntry, ReviewSubject, Violation, ViolationKind};
pub use contract::ArchitectureContract;
pub use contradiction::{detect_contradictions, Contradiction};
pub use engine::{GovernanceEngine, Verdict};
pub use error::{GovernanceError, LedgerError, ManifestError};
pub use event::{
    FrozenRecord, GovernanceEvent, RejectionRecord, EXIT_ADMISSIBLE, EXIT_FAULT, EXIT_REJECTED,
};
pub use freeze::FreezeAuthority;
pub use gate::{ReviewResult, ReviewerGate};
pub use identity::GovernanceIdentity;
pub use ledger::{FileLedger, InMemoryLedger, Ledger, LedgerEntry};
pub use manifest::{CheckId, GovernanceManifest};
pub use plan::{Invariant, Plan, PlanState};
pub use retry::{RetryController, RetryPhase, RetryState};
pub use schema::PlanSchema;
