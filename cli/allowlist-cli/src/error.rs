//! Error types for the mint ledger.

use thiserror::Error;

use crate::ledger::TokenId;

/// Reasons a ledger operation is refused. Every refusal leaves the ledger
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Mint attempted while the sale is closed.
    #[error("minting is not open")]
    NotOpen,

    /// The proof did not verify against any registered allowlist root.
    #[error("caller is not allowlisted")]
    NotAllowlisted,

    #[error("underpaid: price is {required}, got {offered}")]
    Underpaid { required: u128, offered: u128 },

    #[error("sold out: max supply of {max_supply} reached")]
    SoldOut { max_supply: u64 },

    /// Caller already holds as many tokens as a wallet may mint.
    #[error("wallet limit of {limit} reached")]
    WalletLimitReached { limit: u32 },

    /// Transfer source does not hold the token.
    #[error("sender does not own token {0}")]
    NotOwner(TokenId),

    #[error("token {0} has not been minted")]
    UnknownToken(TokenId),

    /// Admin call from someone other than the operator, or a privileged call
    /// from an unapproved proxy or staking address.
    #[error("caller is not authorized")]
    Unauthorized,

    #[error("invalid root set: {0}")]
    InvalidRootSet(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(LedgerError::NotOpen.to_string(), "minting is not open");
        assert_eq!(
            LedgerError::Underpaid {
                required: 10,
                offered: 3
            }
            .to_string(),
            "underpaid: price is 10, got 3"
        );
        assert_eq!(
            LedgerError::SoldOut { max_supply: 5 }.to_string(),
            "sold out: max supply of 5 reached"
        );
        assert_eq!(
            LedgerError::UnknownToken(7).to_string(),
            "token 7 has not been minted"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LedgerError>();
    }

    #[test]
    fn error_converts_into_anyhow() {
        let err: anyhow::Error = LedgerError::NotAllowlisted.into();
        assert_eq!(err.to_string(), "caller is not allowlisted");
    }
}
