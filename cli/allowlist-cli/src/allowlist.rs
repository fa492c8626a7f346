//! Allowlist construction: cohort-tagged leaves hashed into a sorted-pair
//! Merkle tree.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::common::{keccak256, parse_address, Address, Digest};
use crate::merkle::{MerkleTree, Proof};

/// A named partition of the allowlist, e.g. `reapers` or `tricksters`.
///
/// When leaves are cohort-salted the UTF-8 name is appended to the address
/// before hashing, so the same address hashes differently in each cohort.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cohort(String);

impl Cohort {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            anyhow::bail!("Cohort name must not be empty");
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an address becomes a leaf. Fixed per deployment and shared by the
/// tree builder and the mint gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafEncoding {
    /// `keccak256(address)`
    #[default]
    Plain,
    /// `keccak256(address || cohort_name)`
    CohortSalted,
}

/// Hashes `address` into a leaf.
///
/// The salt is only mixed in for [`LeafEncoding::CohortSalted`]; a plain
/// encoding ignores `cohort` entirely.
pub fn leaf_for(address: &Address, cohort: Option<&Cohort>, encoding: LeafEncoding) -> Digest {
    match (encoding, cohort) {
        (LeafEncoding::CohortSalted, Some(cohort)) => {
            keccak256(&[address, cohort.as_str().as_bytes()])
        }
        _ => keccak256(&[address]),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Sort the base layer ascending before building, which makes the root
    /// depend only on the leaf multiset.
    pub sort_leaves: bool,
}

/// Builds one cohort's tree from an ordered candidate list.
#[derive(Debug, Clone)]
pub struct AllowlistBuilder {
    cohort: Option<Cohort>,
    encoding: LeafEncoding,
    options: BuildOptions,
}

impl AllowlistBuilder {
    /// Builder for unsalted `keccak256(address)` leaves.
    pub fn plain() -> Self {
        Self {
            cohort: None,
            encoding: LeafEncoding::Plain,
            options: BuildOptions::default(),
        }
    }

    /// Builder whose leaves are salted with `cohort`.
    pub fn salted(cohort: Cohort) -> Self {
        Self {
            cohort: Some(cohort),
            encoding: LeafEncoding::CohortSalted,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Hashes every address and assembles the tree. Duplicate addresses are
    /// kept and produce duplicate leaves.
    ///
    /// # Errors
    /// Returns an error if `addresses` is empty
    pub fn build(&self, addresses: &[Address]) -> Result<Allowlist> {
        if addresses.is_empty() {
            anyhow::bail!("Allowlist needs at least one address");
        }

        let mut leaves: Vec<Digest> = addresses
            .iter()
            .map(|address| leaf_for(address, self.cohort.as_ref(), self.encoding))
            .collect();
        if self.options.sort_leaves {
            leaves.sort_unstable();
        }

        let tree = MerkleTree::from_leaves(leaves)?;
        tracing::debug!(
            cohort = self.cohort.as_ref().map(Cohort::as_str),
            leaves = tree.leaf_count(),
            "built allowlist tree"
        );

        Ok(Allowlist {
            cohort: self.cohort.clone(),
            encoding: self.encoding,
            tree,
        })
    }
}

/// A built allowlist: the tree plus what is needed to re-derive leaves.
#[derive(Debug, Clone)]
pub struct Allowlist {
    cohort: Option<Cohort>,
    encoding: LeafEncoding,
    tree: MerkleTree,
}

impl Allowlist {
    pub fn root(&self) -> Digest {
        self.tree.root()
    }

    pub fn leaves(&self) -> &[Digest] {
        self.tree.leaves()
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub fn cohort(&self) -> Option<&Cohort> {
        self.cohort.as_ref()
    }

    pub fn leaf_of(&self, address: &Address) -> Digest {
        leaf_for(address, self.cohort.as_ref(), self.encoding)
    }

    /// Proof for `address`, or an error if it is not on the list.
    pub fn proof_for(&self, address: &Address) -> Result<Proof> {
        self.tree.prove(&self.leaf_of(address))
    }
}

/// Reads a candidate address list: either a JSON array of hex strings or
/// plain text with one address per line. Blank lines are skipped.
pub fn read_address_list(path: &Path) -> Result<Vec<Address>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read address list {:?}", path))?;
    parse_address_list(&content)
}

pub fn parse_address_list(content: &str) -> Result<Vec<Address>> {
    let entries: Vec<String> = if content.trim_start().starts_with('[') {
        serde_json::from_str(content).context("Failed to parse address JSON array")?
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            parse_address(entry).with_context(|| format!("Invalid address at entry {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hash_sorted_pair;
    use crate::merkle::verify_proof;
    use proptest::prelude::*;

    fn addr(byte: u8) -> Address {
        [byte; 20]
    }

    fn reapers() -> Cohort {
        Cohort::new("reapers").unwrap()
    }

    #[test]
    fn test_plain_leaf_is_hash_of_address() {
        let a = addr(1);
        assert_eq!(leaf_for(&a, None, LeafEncoding::Plain), keccak256(&[&a]));
        // Plain encoding ignores the cohort.
        assert_eq!(
            leaf_for(&a, Some(&reapers()), LeafEncoding::Plain),
            keccak256(&[&a])
        );
    }

    #[test]
    fn test_salted_leaf_appends_cohort_name() {
        let a = addr(1);
        let leaf = leaf_for(&a, Some(&reapers()), LeafEncoding::CohortSalted);
        assert_eq!(leaf, keccak256(&[&a, b"reapers"]));
        let tricksters = Cohort::new("tricksters").unwrap();
        let other = leaf_for(&a, Some(&tricksters), LeafEncoding::CohortSalted);
        assert_ne!(leaf, other);
    }

    #[test]
    fn test_empty_cohort_name_rejected() {
        assert!(Cohort::new("  ").is_err());
    }

    #[test]
    fn test_build_requires_addresses() {
        assert!(AllowlistBuilder::plain().build(&[]).is_err());
    }

    #[test]
    fn test_three_member_root() {
        let members = [addr(1), addr(2), addr(3)];
        let list = AllowlistBuilder::salted(reapers()).build(&members).unwrap();
        let leaves: Vec<Digest> = members.iter().map(|a| list.leaf_of(a)).collect();
        let expected = hash_sorted_pair(&hash_sorted_pair(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(list.root(), expected);
        assert_eq!(list.leaves(), leaves.as_slice());
    }

    #[test]
    fn test_members_prove_and_outsider_does_not() {
        let members = [addr(1), addr(2), addr(3)];
        let list = AllowlistBuilder::salted(reapers()).build(&members).unwrap();
        for member in &members {
            let proof = list.proof_for(member).unwrap();
            assert!(verify_proof(&proof, &list.leaf_of(member), &list.root()));
        }
        assert!(list.proof_for(&addr(9)).is_err());
        let borrowed = list.proof_for(&addr(1)).unwrap();
        assert!(!verify_proof(&borrowed, &list.leaf_of(&addr(9)), &list.root()));
    }

    #[test]
    fn test_duplicates_kept() {
        let list = AllowlistBuilder::plain()
            .build(&[addr(1), addr(1), addr(2)])
            .unwrap();
        assert_eq!(list.leaves().len(), 3);
    }

    #[test]
    fn test_parse_address_list_lines() {
        let content = concat!(
            "0x1111111111111111111111111111111111111111\n",
            "\n",
            "  2222222222222222222222222222222222222222 \n",
        );
        let list = parse_address_list(content).unwrap();
        assert_eq!(list, vec![addr(0x11), addr(0x22)]);
    }

    #[test]
    fn test_parse_address_list_json() {
        let content = r#"[
  "0x1111111111111111111111111111111111111111",
  "0x2222222222222222222222222222222222222222"
]"#;
        let list = parse_address_list(content).unwrap();
        assert_eq!(list, vec![addr(0x11), addr(0x22)]);
    }

    #[test]
    fn test_parse_address_list_reports_bad_entry() {
        let err = parse_address_list("0x1111111111111111111111111111111111111111\nnope\n")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("entry 2"));
    }

    proptest! {
        #[test]
        fn prop_sorted_leaves_ignore_input_order(
            raw in proptest::collection::vec(any::<[u8; 20]>(), 1..30),
            seed in any::<u64>(),
        ) {
            let builder = AllowlistBuilder::plain()
                .with_options(BuildOptions { sort_leaves: true });
            let mut shuffled = raw.clone();
            // Deterministic rotation plus reversal keeps the multiset intact.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
            prop_assert_eq!(
                builder.build(&raw).unwrap().root(),
                builder.build(&shuffled).unwrap().root()
            );
        }
    }
}
