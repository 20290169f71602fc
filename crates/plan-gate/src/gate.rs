use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::checks::{build_checks, ReviewerCheck};
use crate::context::{CheckReport, ReviewSubject, Violation, ViolationKind};
use crate::contract::ArchitectureContract;
use crate::contradiction::{detect_contradictions, Contradiction};
use crate::error::GovernanceError;
use crate::manifest::{CheckId, GovernanceManifest};
use crate::plan::Plan;
use crate::schema::PlanSchema;

/// Everything one review produced.
#[derive(Clone, Debug)]
pub struct ReviewResult {
    /// One report per enabled check, in execution order.
    pub reports: Vec<CheckReport>,
    /// Violations not attributable to a single check (plan typing).
    pub structural: Vec<Violation>,
    /// Side channel: never a reason for failure.
    pub contradictions: Vec<Contradiction>,
    pub plan: Option<Plan>,
}

impl ReviewResult {
    pub fn admissible(&self) -> bool {
        self.structural.is_empty() && self.reports.iter().all(CheckReport::passed)
    }

    /// All violations in check order, uncapped.
    pub fn violations(&self) -> Vec<Violation> {
        self.structural
            .iter()
            .chain(self.reports.iter().flat_map(|r| r.violations.iter()))
            .cloned()
            .collect()
    }

    /// Sections of passing checks that no violation and no failing check touch.
    ///
    /// Nothing is locked when a gating check failed, since the plan was never
    /// understood well enough to trust any part of it.
    pub fn locked_sections(&self) -> Vec<String> {
        let gating_failed = !self.structural.is_empty()
            || self.reports.iter().any(|r| r.skipped);
        if gating_failed {
            return Vec::new();
        }

        let mut tainted: BTreeSet<&str> = BTreeSet::new();
        for report in &self.reports {
            if !report.passed() {
                tainted.extend(report.sections.iter().map(String::as_str));
            }
            tainted.extend(report.violations.iter().map(|v| v.section.as_str()));
        }

        let locked: BTreeSet<&str> = self
            .reports
            .iter()
            .filter(|r| r.passed())
            .flat_map(|r| r.sections.iter().map(String::as_str))
            .filter(|s| !tainted.contains(s))
            .collect();
        locked.into_iter().map(String::from).collect()
    }
}

/// The reviewer gate: runs the enabled checks against a plan document.
///
/// Gating checks run first and in order. If one fails the rest are skipped.
/// Otherwise the plan is typed and the remaining checks run concurrently on
/// scoped threads; their reports are collected in registration order, so the
/// outcome never depends on scheduling.
pub struct ReviewerGate {
    checks: Vec<Arc<dyn ReviewerCheck>>,
    manifest: Arc<GovernanceManifest>,
    contract: Arc<ArchitectureContract>,
}

impl ReviewerGate {
    pub fn new(
        manifest: Arc<GovernanceManifest>,
        contract: Arc<ArchitectureContract>,
        schema: &PlanSchema,
    ) -> Result<Self, GovernanceError> {
        let checks = build_checks(&manifest, schema)?;
        Ok(Self {
            checks,
            manifest,
            contract,
        })
    }

    pub fn with_checks(
        checks: Vec<Arc<dyn ReviewerCheck>>,
        manifest: Arc<GovernanceManifest>,
        contract: Arc<ArchitectureContract>,
    ) -> Self {
        Self {
            checks,
            manifest,
            contract,
        }
    }

    pub fn manifest(&self) -> &GovernanceManifest {
        &self.manifest
    }

    /// Structured definitions of every enabled check.
    pub fn definitions(&self) -> Value {
        Value::Array(self.checks.iter().map(|c| c.definition()).collect())
    }

    pub fn check_ids(&self) -> Vec<CheckId> {
        self.checks.iter().map(|c| c.check_id()).collect()
    }

    pub fn review(&self, document: &Value) -> ReviewResult {
        let mut reports = Vec::with_capacity(self.checks.len());
        let subject = ReviewSubject {
            document,
            plan: None,
            contract: &self.contract,
            manifest: &self.manifest,
        };

        let (gating, rest): (Vec<&dyn ReviewerCheck>, Vec<&dyn ReviewerCheck>) = self
            .checks
            .iter()
            .map(|check| &**check)
            .partition(|check| check.is_gating());

        let mut gate_failed = false;
        for check in &gating {
            let report = run_check(*check, &subject);
            gate_failed |= !report.passed();
            reports.push(report);
            if gate_failed {
                break;
            }
        }

        let mut structural = Vec::new();
        let plan = if gate_failed {
            None
        } else {
            match Plan::from_document(document) {
                Ok(plan) => Some(plan),
                Err(e) => {
                    structural.push(
                        Violation::new(
                            CheckId::Schema,
                            ViolationKind::SchemaInvalid,
                            "structure",
                            format!("Plan does not match the expected structure: {e}"),
                        )
                        .with_reference("/"),
                    );
                    None
                }
            }
        };

        match &plan {
            Some(plan) => {
                let subject = ReviewSubject {
                    plan: Some(plan),
                    ..subject
                };
                let concurrent: Vec<CheckReport> = std::thread::scope(|scope| {
                    let handles: Vec<_> = rest
                        .iter()
                        .map(|&check| {
                            let subject = &subject;
                            scope.spawn(move || run_check(check, subject))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|handle| {
                            handle
                                .join()
                                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                        })
                        .collect()
                });
                reports.extend(concurrent);
            }
            None => {
                for check in gating.iter().skip(reports.len()).chain(rest.iter()) {
                    reports.push(CheckReport::skipped(check.check_id(), check.sections()));
                }
            }
        }

        let contradictions = plan
            .as_ref()
            .map(|p| detect_contradictions(&p.invariants))
            .unwrap_or_default();

        ReviewResult {
            reports,
            structural,
            contradictions,
            plan,
        }
    }
}

fn run_check(check: &dyn ReviewerCheck, subject: &ReviewSubject<'_>) -> CheckReport {
    let violations = check.evaluate(subject);
    if violations.is_empty() {
        debug!(check = %check.check_id(), "Check passed");
    } else {
        warn!(
            check = %check.check_id(),
            violations = violations.len(),
            "Check failed"
        );
    }
    CheckReport {
        check_id: check.check_id(),
        sections: check.sections(),
        violations,
        skipped: false,
    }
}
