use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

use allowlist_cli::allowlist::{
    read_address_list, Allowlist, AllowlistBuilder, BuildOptions, Cohort,
};
use allowlist_cli::common::{hex_encode, Address, Digest};
use allowlist_cli::merkle::{render_index_map, render_tree};
use allowlist_cli::write_file_atomic;

#[derive(Parser, Debug)]
#[command(about = "Build a cohort's Merkle tree from candidate addresses", long_about = None)]
pub struct Cli {
    /// Input file containing addresses (one per line, or a JSON array)
    #[arg(short, long)]
    input: PathBuf,

    /// Cohort name; when set, every leaf is salted with it
    #[arg(short, long)]
    cohort: Option<String>,

    /// Sort leaves before building so the root ignores input order
    #[arg(long)]
    sort_leaves: bool,

    /// Output file for Merkle root
    #[arg(short, long)]
    root_output: PathBuf,

    /// Output file for index map (address -> leaf index)
    #[arg(short = 'x', long)]
    index_output: PathBuf,

    /// Output file for Merkle tree (for proof generation)
    #[arg(short, long)]
    tree_output: PathBuf,
}

/// Pairs every input address with the position of its leaf in the tree.
///
/// With sorted leaves the input order no longer matches leaf positions, so
/// positions are looked up by leaf. Duplicates map to the first occurrence.
pub fn index_map_for(
    allowlist: &Allowlist,
    addresses: &[Address],
) -> Result<Vec<(Address, usize)>> {
    let mut positions: HashMap<Digest, usize> = HashMap::with_capacity(addresses.len());
    for (i, leaf) in allowlist.leaves().iter().enumerate() {
        positions.entry(*leaf).or_insert(i);
    }

    addresses
        .iter()
        .map(|address| {
            positions
                .get(&allowlist.leaf_of(address))
                .map(|index| (*address, *index))
                .context("Address leaf missing from freshly built tree")
        })
        .collect()
}

pub fn run(cli: Cli) -> Result<()> {
    info!(input = ?cli.input, "reading addresses");
    let addresses = read_address_list(&cli.input)?;
    info!(count = addresses.len(), "addresses loaded");

    let builder = match cli.cohort {
        Some(name) => AllowlistBuilder::salted(Cohort::new(name)?),
        None => AllowlistBuilder::plain(),
    }
    .with_options(BuildOptions {
        sort_leaves: cli.sort_leaves,
    });

    info!("building Merkle tree");
    let allowlist = builder.build(&addresses)?;
    let root = hex_encode(allowlist.root());

    write_file_atomic(&cli.root_output, &format!("{}\n", root))
        .context("Failed to write root")?;

    let index_map = index_map_for(&allowlist, &addresses)?;
    write_file_atomic(&cli.index_output, &render_index_map(&index_map))
        .context("Failed to write index")?;

    info!(path = ?cli.tree_output, "writing Merkle tree");
    write_file_atomic(&cli.tree_output, &render_tree(allowlist.tree()))
        .context("Failed to write tree")?;

    println!("Merkle root: {}", root);
    println!("Leaves: {}", allowlist.leaves().len());
    Ok(())
}
