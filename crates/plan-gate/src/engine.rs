use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use plan_gate_canonical::{digest, digest_bytes, parse_strict, CanonicalError, Digest};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::checks::schema::STRUCTURE_SECTION;
use crate::context::{RejectionEntry, Violation, ViolationKind};
use crate::contract::ArchitectureContract;
use crate::contradiction::Contradiction;
use crate::error::GovernanceError;
use crate::event::{
    FrozenRecord, GovernanceEvent, RejectionRecord, REMEDIATION_EXHAUSTED, REMEDIATION_FROZEN,
    REMEDIATION_RETRY,
};
use crate::freeze::FreezeAuthority;
use crate::gate::ReviewerGate;
use crate::identity::GovernanceIdentity;
use crate::ledger::Ledger;
use crate::manifest::{CheckId, GovernanceManifest};
use crate::plan::{anonymous_lineage, lineage_id, PlanState};
use crate::retry::{lock_sections, RetryController, RetryPhase, RetryState};
use crate::schema::PlanSchema;

/// Outcome of one submission.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verdict {
    pub event: GovernanceEvent,
    pub state: PlanState,
    pub phase: RetryPhase,
    /// Set when an already frozen plan was resubmitted and nothing was written.
    pub resumed: bool,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        self.event.exit_code()
    }

    pub fn authority_granted(&self) -> bool {
        self.event.authority_granted()
    }
}

/// The Governance Engine.
///
/// Built once per process from an immutable manifest, contract and ledger
/// handle. The governance identity is computed at construction and shared by
/// every evaluation; `submit` may be called concurrently.
pub struct GovernanceEngine {
    manifest: Arc<GovernanceManifest>,
    gate: Arc<ReviewerGate>,
    identity: GovernanceIdentity,
    controller: RetryController,
    ledger: Arc<dyn Ledger>,
    freeze: FreezeAuthority,
}

struct Rejection<'a> {
    lineage: &'a str,
    plan_hash: Digest,
    plan: Value,
    attempt: u32,
    violations: &'a [Violation],
    locked_sections: BTreeMap<String, Digest>,
    contradictions: Vec<Contradiction>,
}

impl GovernanceEngine {
    pub fn new(
        manifest: Arc<GovernanceManifest>,
        contract: Arc<ArchitectureContract>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self, GovernanceError> {
        manifest.validate()?;
        let schema = PlanSchema::embedded()?;
        let gate = ReviewerGate::new(Arc::clone(&manifest), contract, &schema)?;
        let identity = GovernanceIdentity::compute(&gate, &schema)?;
        info!(
            governance_version = %identity.governance_version,
            schema_version = %identity.schema_version,
            checks = ?gate.check_ids(),
            "Governance engine initialized"
        );
        Ok(Self {
            controller: RetryController::new(manifest.retry_budget),
            manifest,
            gate: Arc::new(gate),
            identity,
            freeze: FreezeAuthority::new(Arc::clone(&ledger)),
            ledger,
        })
    }

    pub fn identity(&self) -> &GovernanceIdentity {
        &self.identity
    }

    pub fn governance_version(&self) -> Digest {
        self.identity.governance_version
    }

    pub fn schema_version(&self) -> &str {
        &self.identity.schema_version
    }

    pub fn manifest(&self) -> &GovernanceManifest {
        &self.manifest
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Parse plan text strictly and submit it.
    ///
    /// Text that is not one well-formed JSON document (including duplicate
    /// keys) is rejected under RG-SCHEMA-001 on a lineage keyed by the digest
    /// of the raw bytes.
    pub async fn submit_str(&self, text: &str) -> Result<Verdict, GovernanceError> {
        match parse_strict(text) {
            Ok(document) => self.submit(document).await,
            Err(error) => self.submit_unparseable(text, &error).await,
        }
    }

    /// Evaluate one plan submission and record its outcome.
    pub async fn submit(&self, document: Value) -> Result<Verdict, GovernanceError> {
        let plan_hash = digest(&document)?;
        let lineage = lineage_id(&document, &plan_hash);
        info!(lineage = %lineage, plan_hash = %plan_hash, "Plan submitted");

        let history = self.ledger.lineage_history(&lineage).await?;
        let state = RetryState::from_history(&history);

        if let Some(frozen) = &state.frozen {
            if frozen.plan_hash == plan_hash {
                info!(lineage = %lineage, "Plan already frozen; resuming");
                return Ok(Verdict {
                    event: GovernanceEvent::PlanFrozen(frozen.clone()),
                    state: PlanState::Frozen,
                    phase: RetryPhase::Pass,
                    resumed: true,
                });
            }
            // The ledger accepts nothing after a freeze, so this is reported only.
            warn!(
                lineage = %lineage,
                frozen_hash = %frozen.plan_hash,
                "Different plan submitted to a frozen lineage"
            );
            let violation = self.controller.frozen_violation(frozen);
            let record = self.rejection_record(
                Rejection {
                    lineage: &lineage,
                    plan_hash,
                    plan: document,
                    attempt: state.current_attempt(),
                    violations: std::slice::from_ref(&violation),
                    locked_sections: BTreeMap::new(),
                    contradictions: Vec::new(),
                },
                false,
                REMEDIATION_FROZEN,
            );
            return Ok(Verdict {
                event: GovernanceEvent::PlanRejected(record),
                state: PlanState::Draft.transition(PlanState::Rejected)?,
                phase: RetryPhase::Fail,
                resumed: false,
            });
        }

        if self.controller.is_exhausted(&state) {
            return self.exhausted(&lineage, plan_hash, document, &state);
        }

        let document = Arc::new(document);
        let gate = Arc::clone(&self.gate);
        let reviewed = Arc::clone(&document);
        let review = tokio::task::spawn_blocking(move || gate.review(&reviewed))
            .await
            .map_err(|e| GovernanceError::ReviewTask(e.to_string()))?;

        let lock_violations = self.controller.verify_locks(&state, &document)?;
        let passed = review.admissible() && lock_violations.is_empty();
        let phase = self.controller.decide(&state, passed);

        if phase == RetryPhase::Pass {
            let record = FrozenRecord {
                timestamp: Utc::now(),
                lineage: lineage.clone(),
                plan_hash,
                plan: (*document).clone(),
                governance_version: self.identity.governance_version,
                schema_version: self.identity.schema_version.clone(),
                attempt: state.current_attempt(),
                authority_granted: true,
            };
            let entry = self
                .freeze
                .freeze(&review, &lock_violations, record, history.len())
                .await?;
            return Ok(Verdict {
                event: entry.event,
                state: PlanState::Draft.transition(PlanState::Frozen)?,
                phase,
                resumed: false,
            });
        }

        let mut violations = lock_violations;
        violations.extend(review.violations());
        let locked_sections = if phase == RetryPhase::RetryPermitted {
            lock_sections(&document, &review.locked_sections())?
        } else {
            BTreeMap::new()
        };
        self.record_failure(
            phase,
            Rejection {
                lineage: &lineage,
                plan_hash,
                plan: (*document).clone(),
                attempt: state.current_attempt(),
                violations: &violations,
                locked_sections,
                contradictions: review.contradictions.clone(),
            },
            history.len(),
        )
        .await
    }

    /// Reject text that never became a JSON document.
    async fn submit_unparseable(
        &self,
        text: &str,
        error: &CanonicalError,
    ) -> Result<Verdict, GovernanceError> {
        let plan_hash = digest_bytes(text.as_bytes());
        let lineage = anonymous_lineage(&plan_hash);
        warn!(lineage = %lineage, error = %error, "Plan is not well-formed JSON");

        let history = self.ledger.lineage_history(&lineage).await?;
        let state = RetryState::from_history(&history);
        let plan = Value::String(text.to_string());
        if self.controller.is_exhausted(&state) {
            return self.exhausted(&lineage, plan_hash, plan, &state);
        }

        let violation = Violation::new(
            CheckId::Schema,
            ViolationKind::SchemaInvalid,
            STRUCTURE_SECTION,
            format!("Could not load plan JSON: {error}"),
        )
        .with_reference("/");
        let phase = self.controller.decide(&state, false);
        self.record_failure(
            phase,
            Rejection {
                lineage: &lineage,
                plan_hash,
                plan,
                attempt: state.current_attempt(),
                violations: std::slice::from_ref(&violation),
                locked_sections: BTreeMap::new(),
                contradictions: Vec::new(),
            },
            history.len(),
        )
        .await
    }

    /// Answer a submission on an exhausted lineage. Nothing is written.
    fn exhausted(
        &self,
        lineage: &str,
        plan_hash: Digest,
        plan: Value,
        state: &RetryState,
    ) -> Result<Verdict, GovernanceError> {
        warn!(lineage = %lineage, "Submission on exhausted lineage");
        let violation = self.controller.exhausted_violation();
        let record = self.rejection_record(
            Rejection {
                lineage,
                plan_hash,
                plan,
                attempt: state.current_attempt(),
                violations: std::slice::from_ref(&violation),
                locked_sections: BTreeMap::new(),
                contradictions: Vec::new(),
            },
            false,
            REMEDIATION_EXHAUSTED,
        );
        Ok(Verdict {
            event: GovernanceEvent::FailureRetryExhausted(record),
            state: PlanState::Draft.transition(PlanState::Rejected)?,
            phase: RetryPhase::RetryExhausted,
            resumed: false,
        })
    }

    /// Append a `PLAN_REJECTED` or `FAILURE_RETRY_EXHAUSTED` entry for a failed
    /// evaluation.
    async fn record_failure(
        &self,
        phase: RetryPhase,
        rejection: Rejection<'_>,
        expected_len: usize,
    ) -> Result<Verdict, GovernanceError> {
        let retry_permitted = phase == RetryPhase::RetryPermitted;
        let violations = rejection.violations.len();
        let lineage = rejection.lineage.to_string();
        let remediation = if retry_permitted {
            REMEDIATION_RETRY
        } else {
            REMEDIATION_EXHAUSTED
        };
        let record = self.rejection_record(rejection, retry_permitted, remediation);
        let event = if retry_permitted {
            GovernanceEvent::PlanRejected(record)
        } else {
            GovernanceEvent::FailureRetryExhausted(record)
        };
        warn!(
            lineage = %lineage,
            event_type = event.event_type(),
            violations,
            "Plan rejected"
        );
        let entry = self.freeze.record_rejection(event, expected_len).await?;
        Ok(Verdict {
            event: entry.event,
            state: PlanState::Draft.transition(PlanState::Rejected)?,
            phase,
            resumed: false,
        })
    }

    fn rejection_record(
        &self,
        rejection: Rejection<'_>,
        retry_permitted: bool,
        remediation: &str,
    ) -> RejectionRecord {
        let errors: Vec<RejectionEntry> = rejection
            .violations
            .iter()
            .take(self.manifest.max_errors)
            .map(RejectionEntry::from)
            .collect();
        RejectionRecord {
            timestamp: Utc::now(),
            lineage: rejection.lineage.to_string(),
            plan_hash: rejection.plan_hash,
            plan: rejection.plan,
            governance_version: self.identity.governance_version,
            attempt: rejection.attempt,
            authority_granted: false,
            retry_permitted,
            error_count: errors.len(),
            errors,
            locked_sections: rejection.locked_sections,
            contradictions: rejection.contradictions,
            remediation: remediation.to_string(),
        }
    }
}
