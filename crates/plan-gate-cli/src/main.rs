//! run-governance - evaluate execution plans against the governance manifest
//!
//! Exit codes:
//! - 0: plan frozen, execution authority granted
//! - 1: plan rejected (`PLAN_REJECTED` or `FAILURE_RETRY_EXHAUSTED`)
//! - 2: internal fault; no verdict was reached

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use plan_gate::EXIT_FAULT;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "run-governance")]
#[command(about = "Constitutional admissibility gate for execution plans", long_about = None)]
#[command(version)]
struct Cli {
    /// Governance manifest; the built-in manifest is used when omitted
    #[arg(long, global = true, env = "PLAN_GATE_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Expected SHA-256 of the canonical manifest document
    #[arg(long, global = true, env = "PLAN_GATE_MANIFEST_DIGEST")]
    manifest_digest: Option<String>,

    /// Architecture contract; the empty contract is used when omitted
    #[arg(long, global = true, env = "PLAN_GATE_CONTRACT")]
    contract: Option<PathBuf>,

    /// Progress ledger file (JSON lines)
    #[arg(
        long,
        global = true,
        env = "PLAN_GATE_LEDGER",
        default_value = ".plan-gate/ledger.jsonl"
    )]
    ledger: PathBuf,

    /// Log level
    #[arg(long, global = true, env = "PLAN_GATE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true, env = "PLAN_GATE_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a plan and record the verdict
    Evaluate {
        /// Plan document (JSON)
        plan: PathBuf,
    },
    /// Print the schema version plans must declare
    SchemaVersion,
    /// Print the active governance hash
    GovernanceHash,
    /// Print the canonical form and digest of a JSON document
    Canonicalize {
        /// JSON document
        file: PathBuf,
    },
    /// Print the ledger entries of a lineage
    History {
        /// Lineage (the plan_id)
        lineage: String,
    },
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    // stdout carries verdicts; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match commands::run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "run-governance failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAULT as u8)
        }
    }
}
