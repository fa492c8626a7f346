use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use k256::ecdsa::SigningKey;
use rand::RngCore;
use sha3::{Digest as _, Keccak256};
use std::path::PathBuf;
use tracing::info;
use zeroize::Zeroize;

use allowlist_cli::common::{hex_encode, Address};
use allowlist_cli::write_file_atomic;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// One address per line
    Lines,
    /// JSON array of address strings
    Json,
}

#[derive(Parser, Debug)]
#[command(about = "Generate random candidate addresses for test allowlists", long_about = None)]
pub struct Cli {
    /// Number of addresses to generate
    #[arg(short = 'n', long, default_value_t = 500)]
    count: usize,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Format::Lines)]
    format: Format,
}

/// Derives the Ethereum address of a secp256k1 key: the last 20 bytes of the
/// Keccak256 hash of the uncompressed public key without its prefix byte.
pub fn signing_key_to_address(signing_key: &SigningKey) -> Address {
    let public_key = signing_key.verifying_key();
    let encoded = public_key.to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

/// Secrets drawn before giving up on the random source. A uniform 32-byte
/// draw falls outside the curve order with probability below 2^-127.
const MAX_KEY_DRAWS: usize = 16;

/// Address of a fresh random wallet. The secret never leaves this function.
///
/// Draws that are zero or not below the curve order are discarded and
/// redrawn.
pub fn random_address(rng: &mut impl RngCore) -> Result<Address> {
    let mut secret = [0u8; 32];
    for _ in 0..MAX_KEY_DRAWS {
        rng.fill_bytes(&mut secret);
        let signing_key = SigningKey::from_slice(&secret);
        secret.zeroize();
        if let Ok(signing_key) = signing_key {
            return Ok(signing_key_to_address(&signing_key));
        }
    }
    anyhow::bail!(
        "Random source produced no valid secp256k1 key in {} draws",
        MAX_KEY_DRAWS
    )
}

pub fn run(cli: Cli) -> Result<()> {
    if cli.count == 0 {
        anyhow::bail!("Count must be at least 1");
    }

    info!(count = cli.count, "generating wallets");
    let mut rng = rand::thread_rng();
    let addresses: Vec<String> = (0..cli.count)
        .map(|_| random_address(&mut rng).map(hex_encode))
        .collect::<Result<_>>()?;

    let contents = match cli.format {
        Format::Lines => addresses.iter().map(|a| format!("{}\n", a)).collect(),
        Format::Json => {
            serde_json::to_string_pretty(&addresses).context("Failed to serialize addresses")?
        }
    };
    write_file_atomic(&cli.output, &contents).context("Failed to write addresses")?;

    println!("Wrote {} addresses to {:?}", addresses.len(), cli.output);
    Ok(())
}
