use prv_types::{Address, Fingerprint};

use crate::records::AccountKind;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("fingerprint must be 32 bytes, got {actual}")]
    InvalidFingerprintLength { actual: usize },

    #[error("content already registered at {address}")]
    AlreadyRegistered { address: Address },

    #[error("prompt index for {prompt_hash} cannot grow past {max_space} bytes ({entries} entries)")]
    IndexCapacityExceeded {
        prompt_hash: Fingerprint,
        entries: usize,
        max_space: usize,
    },

    #[error("no valid address derivation exists")]
    DerivationExhausted,

    #[error("{role} account mismatch: expected {expected}, supplied {supplied}")]
    AccountMismatch {
        role: &'static str,
        expected: Address,
        supplied: Address,
    },

    #[error("account {address} is not a {expected:?}")]
    UnexpectedAccount {
        address: Address,
        expected: AccountKind,
    },

    #[error("transaction targets program {actual}, ledger runs {expected}")]
    WrongProgram { expected: Address, actual: Address },

    #[error("transaction has no instructions")]
    EmptyTransaction,

    #[error("transaction has {count} instructions, limit is {max}")]
    TooManyInstructions { count: usize, max: usize },

    #[error("transaction signature does not verify for the creator")]
    InvalidSignature,

    #[error("prompt index already lists {address}")]
    DuplicateIndexEntry { address: Address },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot rejected: {0}")]
    SnapshotCorrupt(String),

    #[error("ledger state lock poisoned")]
    StatePoisoned,
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<prv_crypto::DerivationError> for LedgerError {
    fn from(_: prv_crypto::DerivationError) -> Self {
        Self::DerivationExhausted
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
