use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use allowlist_cli::allowlist::Cohort;
use allowlist_cli::common::{hex_encode, parse_address, parse_digest, Address, Digest};
use allowlist_cli::ledger::{Amount, Ledger, LedgerConfig, MintState, TokenId};
use allowlist_cli::write_file_atomic;

use crate::prove::ProofOutput;

#[derive(Parser, Debug)]
#[command(about = "Replay a mint plan against an in-memory ledger", long_about = None)]
pub struct Cli {
    /// Plan JSON: ledger config, phase, roots and mint attempts
    #[arg(short, long)]
    plan: PathBuf,

    /// Output JSON file for the outcomes; printed to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MintPlan {
    pub config: LedgerConfig,
    #[serde(default)]
    pub state: MintState,
    #[serde(default)]
    pub roots: Vec<RootEntry>,
    pub attempts: Vec<MintAttempt>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootEntry {
    pub cohort: String,
    pub root: String,
}

/// One mint call. `proof_file` points at a `prove` output and supplies the
/// caller and proof unless they are given inline. A relative `proof_file` is
/// resolved against the directory holding the plan.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MintAttempt {
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub proof: Vec<String>,
    #[serde(default)]
    pub proof_file: Option<PathBuf>,
    #[serde(default)]
    pub payment: Amount,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub caller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub outcomes: Vec<AttemptOutcome>,
    pub total_minted: u64,
    pub proceeds: Amount,
}

impl MintAttempt {
    fn resolve(&self, base_dir: &Path) -> Result<(Address, Vec<Digest>)> {
        let from_file = self
            .proof_file
            .as_deref()
            .map(|path| ProofOutput::load(&base_dir.join(path)))
            .transpose()?;

        let caller = match (&self.caller, &from_file) {
            (Some(caller), _) => parse_address(caller).context("Invalid caller address")?,
            (None, Some(file)) => file.address()?,
            (None, None) => anyhow::bail!("Mint attempt needs a caller or a proof_file"),
        };

        let proof = match from_file {
            Some(file) if self.proof.is_empty() => file.proof()?,
            _ => self
                .proof
                .iter()
                .map(|node| parse_digest(node))
                .collect::<Result<_>>()
                .context("Invalid proof node")?,
        };

        Ok((caller, proof))
    }
}

/// Sets up a ledger from the plan and runs every attempt in order.
///
/// Rejected mints are recorded as outcomes, not errors; only a malformed plan
/// fails the run.
pub fn simulate(plan: &MintPlan, base_dir: &Path) -> Result<SimulationReport> {
    let operator = plan.config.operator;
    let mut ledger = Ledger::new(plan.config.clone());

    if !plan.roots.is_empty() {
        let roots = plan
            .roots
            .iter()
            .map(|entry| -> Result<(Cohort, Digest)> {
                Ok((Cohort::new(entry.cohort.clone())?, parse_digest(&entry.root)?))
            })
            .collect::<Result<Vec<_>>>()
            .context("Invalid root entry")?;
        ledger.set_roots(operator, roots)?;
    }
    ledger.set_mint_state(operator, plan.state)?;

    let mut outcomes = Vec::with_capacity(plan.attempts.len());
    for (i, attempt) in plan.attempts.iter().enumerate() {
        let (caller, proof) = attempt
            .resolve(base_dir)
            .with_context(|| format!("Invalid mint attempt {}", i + 1))?;
        let outcome = match ledger.mint(caller, &proof, attempt.payment) {
            Ok(token_id) => AttemptOutcome {
                caller: hex_encode(caller),
                token_id: Some(token_id),
                error: None,
            },
            Err(err) => {
                warn!(attempt = i + 1, caller = %hex_encode(caller), %err, "mint rejected");
                AttemptOutcome {
                    caller: hex_encode(caller),
                    token_id: None,
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(SimulationReport {
        outcomes,
        total_minted: ledger.total_minted(),
        proceeds: ledger.proceeds(),
    })
}

pub fn run(cli: Cli) -> Result<()> {
    info!(plan = ?cli.plan, "loading mint plan");
    let content = fs::read_to_string(&cli.plan).context("Failed to read plan file")?;
    let plan: MintPlan = serde_json::from_str(&content).context("Failed to parse plan JSON")?;

    let base_dir = cli.plan.parent().unwrap_or_else(|| Path::new("."));
    let report = simulate(&plan, base_dir)?;
    let json_output = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;

    match cli.output {
        Some(path) => {
            write_file_atomic(&path, &json_output).context("Failed to write report")?;
            println!(
                "Minted {} of {} attempts; report written to {:?}",
                report.total_minted,
                report.outcomes.len(),
                path
            );
        }
        None => println!("{}", json_output),
    }
    Ok(())
}
