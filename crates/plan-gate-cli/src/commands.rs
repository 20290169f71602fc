use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use plan_gate::{
    ArchitectureContract, FileLedger, GovernanceEngine, GovernanceManifest, InMemoryLedger, Ledger,
    PlanSchema, EXIT_ADMISSIBLE,
};
use plan_gate_canonical::{canonical_string, digest, parse_strict, Digest};
use tracing::info;

use crate::{Cli, Command};

/// Dispatch a subcommand; returns the process exit code.
pub async fn run(cli: &Cli) -> Result<u8> {
    match &cli.command {
        Command::Evaluate { plan } => evaluate(cli, plan).await,
        Command::SchemaVersion => {
            let schema = PlanSchema::embedded().context("loading embedded plan schema")?;
            println!("{}", schema.version());
            Ok(EXIT_ADMISSIBLE as u8)
        }
        Command::GovernanceHash => {
            // Nothing is written, so the ledger is irrelevant here.
            let engine = build_engine(cli, Arc::new(InMemoryLedger::new()))?;
            println!("{}", engine.governance_version());
            Ok(EXIT_ADMISSIBLE as u8)
        }
        Command::Canonicalize { file } => {
            let text = read(file)?;
            let value = parse_strict(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            println!("{}", canonical_string(&value)?);
            println!("sha256:{}", digest(&value)?);
            Ok(EXIT_ADMISSIBLE as u8)
        }
        Command::History { lineage } => {
            let ledger = open_ledger(cli)?;
            let history = ledger
                .lineage_history(lineage)
                .await
                .with_context(|| format!("reading history of lineage '{lineage}'"))?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(EXIT_ADMISSIBLE as u8)
        }
    }
}

async fn evaluate(cli: &Cli, plan: &Path) -> Result<u8> {
    let ledger = open_ledger(cli)?;
    let engine = build_engine(cli, Arc::new(ledger))?;
    let text = read(plan)?;

    info!(
        plan = %plan.display(),
        governance_version = %engine.governance_version(),
        "Evaluating plan"
    );
    let verdict = engine
        .submit_str(&text)
        .await
        .with_context(|| format!("evaluating {}", plan.display()))?;

    println!("{}", serde_json::to_string_pretty(&verdict.event)?);
    Ok(verdict.exit_code() as u8)
}

fn build_engine(cli: &Cli, ledger: Arc<dyn Ledger>) -> Result<GovernanceEngine> {
    let manifest = match &cli.manifest {
        Some(path) => {
            let seal = cli
                .manifest_digest
                .as_deref()
                .map(str::parse::<Digest>)
                .transpose()
                .context("parsing --manifest-digest")?;
            GovernanceManifest::load(path, seal.as_ref())
                .with_context(|| format!("loading manifest {}", path.display()))?
        }
        None => {
            if cli.manifest_digest.is_some() {
                anyhow::bail!("--manifest-digest requires --manifest");
            }
            GovernanceManifest::default()
        }
    };

    let contract = match &cli.contract {
        Some(path) => ArchitectureContract::load(path)
            .with_context(|| format!("loading contract {}", path.display()))?,
        None => ArchitectureContract::empty(),
    };

    GovernanceEngine::new(Arc::new(manifest), Arc::new(contract), ledger)
        .context("initializing governance engine")
}

fn open_ledger(cli: &Cli) -> Result<FileLedger> {
    FileLedger::open(&cli.ledger).with_context(|| format!("opening ledger {}", cli.ledger.display()))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
