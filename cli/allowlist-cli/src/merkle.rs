//! Sorted-pair Merkle tree over 32-byte leaves.
//!
//! Each internal node is `keccak256(min(l, r) || max(l, r))`. A level with an
//! odd number of nodes carries its last node up unchanged, with no
//! duplication. Proofs are plain sibling sequences and verify without any
//! knowledge of the tree shape.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::common::{hash_sorted_pair, hex_encode, parse_address, parse_digest, Address, Digest};

/// Sibling digests from the leaf level up to, but excluding, the root.
pub type Proof = Vec<Digest>;

/// A Merkle tree stored as its levels, leaves first and root last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Builds the tree from leaves in the given order.
    ///
    /// # Errors
    /// Returns an error if `leaves` is empty
    pub fn from_leaves(leaves: Vec<Digest>) -> Result<Self> {
        if leaves.is_empty() {
            anyhow::bail!("Cannot build a Merkle tree without leaves");
        }

        let mut levels: Vec<Vec<Digest>> = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next_level: Vec<Digest> = level
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hash_sorted_pair(left, right),
                    _ => chunk[0],
                })
                .collect();
            levels.push(next_level);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Digest {
        // from_leaves and load_tree never produce an empty top level
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Position of the first occurrence of `leaf` in the base layer.
    pub fn position(&self, leaf: &Digest) -> Option<usize> {
        self.leaves().iter().position(|candidate| candidate == leaf)
    }

    /// Generates the Merkle proof for the leaf at `leaf_index`.
    ///
    /// Levels where the node on the path had no sibling (it was promoted)
    /// contribute nothing to the proof.
    ///
    /// # Errors
    /// Returns an error if `leaf_index` is out of bounds
    pub fn proof_at(&self, leaf_index: usize) -> Result<Proof> {
        if leaf_index >= self.leaf_count() {
            anyhow::bail!(
                "Leaf index {} is out of bounds for tree with {} leaves",
                leaf_index,
                self.leaf_count()
            );
        }

        let mut proof = Vec::new();
        let mut current_index = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = current_index ^ 1;
            if let Some(sibling) = level.get(sibling_index) {
                proof.push(*sibling);
            }
            current_index /= 2;
        }

        Ok(proof)
    }

    /// Generates the Merkle proof for `leaf`. Duplicated leaves prove through
    /// their first occurrence.
    ///
    /// # Errors
    /// Returns an error if the leaf is not part of the tree
    pub fn prove(&self, leaf: &Digest) -> Result<Proof> {
        let index = self
            .position(leaf)
            .with_context(|| format!("Leaf {} is not part of the tree", hex_encode(leaf)))?;
        self.proof_at(index)
    }
}

/// Verifies that `leaf` belongs to the tree committed to by `root`.
///
/// Folds the proof left to right with sorted-pair hashing. A malformed proof
/// and a non-member leaf are indistinguishable: both return `false`.
pub fn verify_proof(proof: &[Digest], leaf: &Digest, root: &Digest) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_sorted_pair(&acc, sibling));
    &computed == root
}

/// Writes every node as `level:index:0xhash`, one per line.
pub fn render_tree(tree: &MerkleTree) -> String {
    let mut out = String::new();
    for (level_num, level) in tree.levels().iter().enumerate() {
        for (i, hash) in level.iter().enumerate() {
            out.push_str(&format!("{}:{}:{}\n", level_num, i, hex_encode(hash)));
        }
    }
    out
}

/// Loads a tree written by [`render_tree`] and checks that every internal
/// node matches the hash of its children.
pub fn load_tree(path: &Path) -> Result<MerkleTree> {
    let file = File::open(path).context("Failed to open Merkle tree file")?;
    let reader = BufReader::new(file);

    let mut level_entries: Vec<HashMap<usize, Digest>> = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 3 {
            anyhow::bail!(
                "Invalid format at line {}: expected 'level:index:hash', got '{}'",
                line_num + 1,
                trimmed
            );
        }
        let level: usize = parts[0].parse().context("Invalid level format")?;
        let index: usize = parts[1].parse().context("Invalid index format")?;
        let hash = parse_digest(parts[2]).context("Invalid hash format")?;

        // Levels are written in order, so a new level can only follow the last one.
        if level > level_entries.len() {
            anyhow::bail!(
                "Invalid level {} at line {}: expected at most {}",
                level,
                line_num + 1,
                level_entries.len()
            );
        }
        if level == level_entries.len() {
            level_entries.push(HashMap::new());
        }
        if level_entries[level].insert(index, hash).is_some() {
            anyhow::bail!("Duplicate entry at level {}, index {}", level, index);
        }
    }

    if level_entries.is_empty() {
        anyhow::bail!("Merkle tree file is empty");
    }

    let mut levels: Vec<Vec<Digest>> = Vec::new();
    for (level_num, level_map) in level_entries.iter().enumerate() {
        if level_map.is_empty() {
            anyhow::bail!("Level {} is empty", level_num);
        }
        let mut level = Vec::with_capacity(level_map.len());
        for idx in 0..level_map.len() {
            let hash = level_map
                .get(&idx)
                .with_context(|| format!("Level {} is missing index {}", level_num, idx))?;
            level.push(*hash);
        }
        levels.push(level);
    }

    let leaves = levels[0].clone();
    let rebuilt = MerkleTree::from_leaves(leaves)?;
    if rebuilt.levels != levels {
        anyhow::bail!("Invalid tree structure: stored nodes do not match the rebuilt tree");
    }

    Ok(rebuilt)
}

/// Renders the address index map as `0xaddress:index` lines, in leaf order.
pub fn render_index_map(index_map: &[(Address, usize)]) -> String {
    let mut out = String::new();
    for (address, index) in index_map {
        out.push_str(&format!("{}:{}\n", hex_encode(address), index));
    }
    out
}

pub fn load_index_map(path: &Path) -> Result<HashMap<Address, usize>> {
    let file = File::open(path).context("Failed to open index map file")?;
    let reader = BufReader::new(file);
    let mut map = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 2 {
            anyhow::bail!(
                "Invalid format at line {}: expected 'address:index', got '{}'",
                line_num + 1,
                trimmed
            );
        }
        let address = parse_address(parts[0]).context("Invalid address format")?;
        let index: usize = parts[1].parse().context("Invalid index format")?;
        map.entry(address).or_insert(index);
    }

    if map.is_empty() {
        anyhow::bail!("Index map file is empty");
    }

    Ok(map)
}
