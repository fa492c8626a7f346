use anyhow::Context;
use sha3::{Digest as _, Keccak256};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A 20-byte account address in canonical byte form.
pub type Address = [u8; 20];

/// A 32-byte Keccak-256 digest. Leaves, internal nodes and roots all use it.
pub type Digest = [u8; 32];

/// Parses an Ethereum address from a hex string.
///
/// Hex digits are accepted in either case; the result is the canonical
/// 20-byte representation that gets hashed into leaves.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix
///
/// # Returns
/// A 20-byte array representing the address
///
/// # Errors
/// Returns an error if the address is not 40 hex characters, contains invalid
/// hex, or is the zero address
pub fn parse_address(addr_str: &str) -> anyhow::Result<Address> {
    let trimmed = addr_str.trim();
    let cleaned = strip_hex_prefix(trimmed);
    if cleaned.len() != 40 {
        anyhow::bail!(
            "Invalid address length: expected 40 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| anyhow::anyhow!("Invalid hex encoding: {}", e))?;
    if address == [0u8; 20] {
        anyhow::bail!("Zero address not allowed");
    }
    Ok(address)
}

/// Parses a 32-byte digest (leaf, node or root) from a hex string.
///
/// # Errors
/// Returns an error if the string is not 64 hex characters
pub fn parse_digest(digest_str: &str) -> anyhow::Result<Digest> {
    let cleaned = strip_hex_prefix(digest_str.trim());
    if cleaned.len() != 64 {
        anyhow::bail!(
            "Invalid digest length: expected 64 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut digest = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut digest).context("Invalid hex encoding")?;
    Ok(digest)
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Renders bytes as a lowercase `0x`-prefixed hex string.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Computes the Keccak256 hash of the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> Digest {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hashes two sibling digests after ordering them ascending.
///
/// The ordering makes the parent independent of which child sat on the left,
/// so a verifier only needs the sibling sequence, not the tree shape.
///
/// # Arguments
/// * `a` - First 32-byte value
/// * `b` - Second 32-byte value
///
/// # Returns
/// `keccak256(min(a, b) || max(a, b))`
pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    if a <= b {
        keccak256(&[a, b])
    } else {
        keccak256(&[b, a])
    }
}

/// Serde adapter storing fixed-size byte arrays as `0x` hex strings.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::hex_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; N];
        hex::decode_to_slice(super::strip_hex_prefix(s.trim()), &mut out)
            .map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

/// Writes `contents` to `path` through a sibling temp file and a rename, so a
/// reader never observes a half-written file.
pub fn write_file_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(contents.as_bytes())
        .context("Failed to write to temp file")?;
    file.flush().context("Failed to flush temp file")?;
    file.sync_all().context("Failed to sync temp file")?;
    std::fs::rename(&temp_path, path).context("Failed to move temp file to output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_prefix() {
        let addr = "0x1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(result[0], 0x12);
        assert_eq!(result[19], 0x78);
    }

    #[test]
    fn test_parse_address_without_prefix() {
        let addr = "1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(result.len(), 20);
    }

    #[test]
    fn test_parse_address_case_insensitive() {
        let lower = parse_address("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        let upper = parse_address("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        let mixed = parse_address("0xAbCdEfabcdefABCDEFabcdefABCDEFabcdefAbCd").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_parse_address_invalid_length() {
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        assert!(parse_address("0xghijklmnopqrstuvwxyz1234567890abcdefghij").is_err());
    }

    #[test]
    fn test_parse_address_zero_rejected() {
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_parse_digest() {
        let digest = parse_digest(&hex_encode([7u8; 32])).unwrap();
        assert_eq!(digest, [7u8; 32]);
        assert!(parse_digest("0x1234").is_err());
    }

    #[test]
    fn test_keccak256_empty_input() {
        // Well-known Keccak-256 of the empty string.
        assert_eq!(
            hex_encode(keccak256(&[])),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_concatenates_parts() {
        let joined = keccak256(&[b"hello world"]);
        let split = keccak256(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, split);
    }

    #[test]
    fn test_hash_sorted_pair_commutative() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        assert_eq!(hash_sorted_pair(&left, &right), hash_sorted_pair(&right, &left));
        assert_eq!(hash_sorted_pair(&right, &left), keccak256(&[&left, &right]));
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.txt");
        write_file_atomic(&path, "0xabc\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0xabc\n");
        assert!(!path.with_extension("tmp").exists());
    }
}
