pub mod allowlist;
pub mod common;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod ownership;
pub mod roots;

pub use allowlist::{leaf_for, Allowlist, AllowlistBuilder, Cohort, LeafEncoding};
pub use common::{hash_sorted_pair, keccak256, parse_address, write_file_atomic, Address, Digest};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Amount, Ledger, LedgerConfig, MintState, TokenId};
pub use merkle::{verify_proof, MerkleTree, Proof};
