use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

const SCHEMA_VERSION: &str = "7dad87b27016d68d23b60aa323e8a7319936c4d826271783d3897ec789e47375";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn run_governance(ledger: &Path) -> Command {
    let mut cmd = Command::cargo_bin("run-governance").unwrap();
    for var in [
        "PLAN_GATE_MANIFEST",
        "PLAN_GATE_MANIFEST_DIGEST",
        "PLAN_GATE_CONTRACT",
        "PLAN_GATE_LOG_JSON",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--ledger").arg(ledger);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn schema_version_matches_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    run_governance(&dir.path().join("ledger.jsonl"))
        .arg("schema-version")
        .assert()
        .success()
        .stdout(format!("{SCHEMA_VERSION}\n"));
}

#[test]
fn valid_plan_is_frozen() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.jsonl");
    let output = run_governance(&ledger)
        .arg("evaluate")
        .arg(fixture("valid_plan.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let event = stdout_json(&output);
    assert_eq!(event["event_type"], "PLAN_FROZEN");
    assert_eq!(event["authority_granted"], true);
    assert_eq!(event["schema_version"], SCHEMA_VERSION);
    assert_eq!(event["plan"]["plan_id"], "checkout");

    run_governance(&ledger)
        .args(["history", "checkout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PLAN_FROZEN"));
}

#[test]
fn dag_cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_governance(&dir.path().join("ledger.jsonl"))
        .arg("evaluate")
        .arg(fixture("fail_dag_cycle.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let event = stdout_json(&output);
    assert_eq!(event["event_type"], "PLAN_REJECTED");
    assert_eq!(event["retry_permitted"], true);
    let errors = event["errors"].as_array().unwrap();
    assert!(!errors.is_empty());
    for error in errors {
        assert_eq!(error["check_id"], "RG-DAG-004");
        let node = error["reference"].as_str().unwrap();
        assert!(["A", "B", "C"].contains(&node));
    }
}

#[test]
fn stale_schema_version_fails_schema_check_only() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_governance(&dir.path().join("ledger.jsonl"))
        .arg("evaluate")
        .arg(fixture("fail_schema_version.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let event = stdout_json(&output);
    let errors = event["errors"].as_array().unwrap();
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e["check_id"] == "RG-SCHEMA-001"));
    assert_eq!(event["locked_sections"], serde_json::json!({}));
}

#[test]
fn failed_retry_exhausts_the_lineage() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.jsonl");
    run_governance(&ledger)
        .arg("evaluate")
        .arg(fixture("fail_dag_cycle.json"))
        .assert()
        .code(1);

    let output = run_governance(&ledger)
        .arg("evaluate")
        .arg(fixture("fail_dag_cycle.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["event_type"], "FAILURE_RETRY_EXHAUSTED");
}

#[test]
fn malformed_plan_is_rejected_not_a_fault() {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("dup.json");
    std::fs::write(&plan, r#"{"plan_id": "x", "plan_id": "y"}"#).unwrap();
    let output = run_governance(&dir.path().join("ledger.jsonl"))
        .arg("evaluate")
        .arg(&plan)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let event = stdout_json(&output);
    assert_eq!(event["event_type"], "PLAN_REJECTED");
    assert_eq!(event["errors"][0]["check_id"], "RG-SCHEMA-001");
    assert_eq!(event["errors"][0]["section"], "structure");
    assert!(event["lineage"].as_str().unwrap().starts_with("anonymous-"));
}

#[test]
fn missing_plan_file_is_an_internal_fault() {
    let dir = tempfile::tempdir().unwrap();
    run_governance(&dir.path().join("ledger.jsonl"))
        .arg("evaluate")
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn manifest_seal_mismatch_is_an_internal_fault() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{"enabled_checks": ["RG-SCHEMA-001"], "required_invariant_domains": []}"#,
    )
    .unwrap();
    run_governance(&dir.path().join("ledger.jsonl"))
        .arg("--manifest")
        .arg(&manifest)
        .arg("--manifest-digest")
        .arg("0".repeat(64))
        .arg("evaluate")
        .arg(fixture("valid_plan.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("seal mismatch"));
}

#[test]
fn governance_hash_follows_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.jsonl");
    let default_hash = run_governance(&ledger)
        .arg("governance-hash")
        .output()
        .unwrap()
        .stdout;

    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{"enabled_checks": ["RG-SCHEMA-001"], "required_invariant_domains": []}"#,
    )
    .unwrap();
    let custom_hash = run_governance(&ledger)
        .arg("--manifest")
        .arg(&manifest)
        .arg("governance-hash")
        .output()
        .unwrap()
        .stdout;

    assert_eq!(default_hash.len(), 65);
    assert_ne!(default_hash, custom_hash);
}

#[test]
fn canonicalize_prints_jcs_and_digest() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("doc.json");
    std::fs::write(&doc, "{ \"b\": 1.0, \"a\": [true, null] }").unwrap();
    run_governance(&dir.path().join("ledger.jsonl"))
        .arg("canonicalize")
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{\"a\":[true,null],\"b\":1}\nsha256:"));
}
