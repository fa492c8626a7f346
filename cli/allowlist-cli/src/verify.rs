use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use allowlist_cli::common::{hex_encode, parse_digest, Digest};
use allowlist_cli::merkle::verify_proof;

use crate::prove::ProofOutput;

#[derive(Parser, Debug)]
#[command(about = "Verify a membership proof without the tree", long_about = None)]
pub struct Cli {
    /// Proof JSON produced by `prove`
    #[arg(short, long, conflicts_with_all = ["leaf", "nodes"])]
    proof: Option<PathBuf>,

    /// Trusted root to check against; defaults to the root in the proof file
    #[arg(short, long, required_unless_present = "proof")]
    root: Option<String>,

    /// Leaf to check when no proof file is given
    #[arg(short, long, required_unless_present = "proof")]
    leaf: Option<String>,

    /// Proof node, leaf level first; repeat for every node
    #[arg(short, long = "node")]
    nodes: Vec<String>,
}

/// What gets checked: a label for messages, the leaf, its proof and the root.
struct Claim {
    label: String,
    leaf: Digest,
    proof: Vec<Digest>,
    root: Digest,
}

impl Cli {
    fn claim(&self) -> Result<Claim> {
        match &self.proof {
            Some(path) => {
                let proof_file = ProofOutput::load(path)?;
                let root = parse_digest(self.root.as_deref().unwrap_or(&proof_file.merkle_root))
                    .context("Invalid Merkle root")?;
                Ok(Claim {
                    leaf: proof_file.checked_leaf()?,
                    proof: proof_file.proof()?,
                    label: proof_file.address,
                    root,
                })
            }
            None => {
                let root = self.root.as_deref().context("--root is required without --proof")?;
                let leaf = self.leaf.as_deref().context("--leaf is required without --proof")?;
                let leaf = parse_digest(leaf).context("Invalid leaf")?;
                let proof = self
                    .nodes
                    .iter()
                    .map(|node| parse_digest(node))
                    .collect::<Result<_>>()
                    .context("Invalid proof node")?;
                Ok(Claim {
                    label: format!("leaf {}", hex_encode(leaf)),
                    leaf,
                    proof,
                    root: parse_digest(root).context("Invalid Merkle root")?,
                })
            }
        }
    }
}

pub fn run(cli: &Cli) -> Result<()> {
    let claim = cli.claim()?;

    info!(leaf = %hex_encode(claim.leaf), nodes = claim.proof.len(), "verifying proof");
    if !verify_proof(&claim.proof, &claim.leaf, &claim.root) {
        anyhow::bail!("Proof for {} does not verify", claim.label);
    }

    println!("Proof for {} is valid", claim.label);
    Ok(())
}
