use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use allowlist_cli::allowlist::{leaf_for, Cohort, LeafEncoding};
use allowlist_cli::common::{hex_encode, parse_address, parse_digest, Address, Digest};
use allowlist_cli::merkle::{load_index_map, load_tree, verify_proof};
use allowlist_cli::write_file_atomic;

#[derive(Parser, Debug)]
#[command(about = "Generate an allowlist membership proof for one address", long_about = None)]
pub struct Cli {
    /// Path to Merkle tree file
    #[arg(short = 't', long)]
    tree: PathBuf,

    /// Path to index map file
    #[arg(short = 'x', long)]
    index_map: PathBuf,

    /// Address to prove membership for
    #[arg(short, long)]
    address: String,

    /// Cohort the tree was salted with, if any
    #[arg(short, long)]
    cohort: Option<String>,

    /// Output JSON file
    #[arg(short, long)]
    output: PathBuf,
}

/// Proof file shared by `prove`, `verify` and `simulate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOutput {
    pub merkle_root: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<String>,
    pub leaf: String,
    pub leaf_index: usize,
    pub merkle_proof: Vec<String>,
}

impl ProofOutput {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read proof file {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse proof JSON")
    }

    pub fn address(&self) -> Result<Address> {
        parse_address(&self.address).context("Invalid address in proof file")
    }

    pub fn proof(&self) -> Result<Vec<Digest>> {
        self.merkle_proof
            .iter()
            .map(|node| parse_digest(node))
            .collect::<Result<_>>()
            .context("Invalid proof node in proof file")
    }

    /// The leaf re-derived from the address and cohort, which must match the
    /// recorded leaf.
    pub fn checked_leaf(&self) -> Result<Digest> {
        let recorded = parse_digest(&self.leaf).context("Invalid leaf in proof file")?;
        let derived = derive_leaf(&self.address()?, self.cohort.as_deref())?;
        if recorded != derived {
            anyhow::bail!("Leaf in proof file does not belong to {}", self.address);
        }
        Ok(derived)
    }
}

/// Leaf for `address`: cohort-salted when a cohort is named, plain otherwise.
pub fn derive_leaf(address: &Address, cohort: Option<&str>) -> Result<Digest> {
    Ok(match cohort {
        Some(name) => leaf_for(address, Some(&Cohort::new(name)?), LeafEncoding::CohortSalted),
        None => leaf_for(address, None, LeafEncoding::Plain),
    })
}

pub fn run(cli: Cli) -> Result<()> {
    info!("loading Merkle tree");
    let tree = load_tree(&cli.tree).context("Failed to load Merkle tree")?;

    info!("loading index map");
    let index_map = load_index_map(&cli.index_map).context("Failed to load index map")?;

    let address = parse_address(&cli.address).context("Invalid address")?;
    let leaf_index = index_map
        .get(&address)
        .copied()
        .context("Address not found in allowlist")?;
    let leaf = *tree.leaves().get(leaf_index).with_context(|| {
        format!(
            "Leaf index {} is out of bounds for tree with {} leaves",
            leaf_index,
            tree.leaf_count()
        )
    })?;

    let expected_leaf = derive_leaf(&address, cli.cohort.as_deref())?;
    if leaf != expected_leaf {
        anyhow::bail!(
            "Leaf at index {} does not match the address; check the --cohort setting",
            leaf_index
        );
    }

    info!(leaf_index, "generating Merkle proof");
    let merkle_proof = tree
        .proof_at(leaf_index)
        .context("Failed to generate Merkle proof")?;
    if !verify_proof(&merkle_proof, &leaf, &tree.root()) {
        anyhow::bail!("Generated proof does not verify against the tree root");
    }

    let output = ProofOutput {
        merkle_root: hex_encode(tree.root()),
        address: hex_encode(address),
        cohort: cli.cohort,
        leaf: hex_encode(leaf),
        leaf_index,
        merkle_proof: merkle_proof.iter().map(hex_encode).collect(),
    };

    info!(path = ?cli.output, "writing proof JSON");
    let json_output = serde_json::to_string_pretty(&output).context("Failed to serialize JSON")?;
    write_file_atomic(&cli.output, &json_output).context("Failed to write proof file")?;

    println!("Proof generated for {}", output.address);
    println!("Merkle root: {}", output.merkle_root);
    println!("Proof length: {} nodes", merkle_proof.len());
    Ok(())
}
