use thiserror::Error;

use prv_ledger::LedgerError;
use prv_types::{Address, Fingerprint};

/// Failures of the client transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Coarse classification of a [`ClientError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFingerprintLength,
    AlreadyRegistered,
    NotFound,
    IndexCapacityExceeded,
    BatchSizeInvalid,
    DerivationExhausted,
    RateLimited,
    TransientFailure,
    AuthorizationUnavailable,
    ConfirmationTimeout,
    InvalidTransaction,
}

/// Errors returned by client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("fingerprint must be 32 bytes, got {actual}")]
    InvalidFingerprintLength { actual: usize },

    #[error("already registered at {address}")]
    AlreadyRegistered { address: Address },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("prompt index for {prompt_hash} is full ({max_space} bytes)")]
    IndexCapacityExceeded {
        prompt_hash: Fingerprint,
        max_space: usize,
    },

    #[error("batch must hold {min} to {max} items, got {count}")]
    BatchSizeInvalid { count: usize, min: usize, max: usize },

    #[error("address derivation exhausted every bump seed")]
    DerivationExhausted,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient failure: {0}")]
    TransientFailure(String),

    #[error("no signer configured")]
    AuthorizationUnavailable,

    #[error("no confirmation within {after_ms} ms; outcome unknown")]
    ConfirmationTimeout { after_ms: u64 },

    #[error("transaction rejected: {0}")]
    InvalidTransaction(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFingerprintLength { .. } => ErrorKind::InvalidFingerprintLength,
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IndexCapacityExceeded { .. } => ErrorKind::IndexCapacityExceeded,
            Self::BatchSizeInvalid { .. } => ErrorKind::BatchSizeInvalid,
            Self::DerivationExhausted => ErrorKind::DerivationExhausted,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::TransientFailure(_) => ErrorKind::TransientFailure,
            Self::AuthorizationUnavailable => ErrorKind::AuthorizationUnavailable,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::InvalidTransaction(_) => ErrorKind::InvalidTransaction,
        }
    }

    /// Only rate limits and transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::TransientFailure
        )
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFingerprintLength { .. } => "Invalid prompt hash length.".into(),
            Self::AlreadyRegistered { .. } => {
                "This prompt is already registered by this creator.".into()
            }
            Self::NotFound(_) => "No registration found for this prompt.".into(),
            Self::IndexCapacityExceeded { .. } => {
                "This prompt has reached the maximum number of registrations.".into()
            }
            Self::BatchSizeInvalid { min, max, .. } => {
                format!("A batch must contain between {min} and {max} items.")
            }
            Self::DerivationExhausted => "Could not derive an account address.".into(),
            Self::RateLimited(_) => {
                "Rate limit exceeded. Please wait a moment and try again.".into()
            }
            Self::TransientFailure(_) => {
                "Failed to load registry data. Please try again later.".into()
            }
            Self::AuthorizationUnavailable => "Connect a signing key to register content.".into(),
            Self::ConfirmationTimeout { .. } => {
                "The transaction was sent but not confirmed in time; check its status before retrying."
                    .into()
            }
            Self::InvalidTransaction(reason) => format!("The ledger rejected the transaction: {reason}"),
        }
    }
}

/// Whether a transport message describes an HTTP 429 style rejection.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.contains("429") || message.to_ascii_lowercase().contains("too many requests")
}

impl From<LedgerError> for ClientError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidFingerprintLength { actual } => {
                Self::InvalidFingerprintLength { actual }
            }
            LedgerError::AlreadyRegistered { address } => Self::AlreadyRegistered { address },
            LedgerError::IndexCapacityExceeded {
                prompt_hash,
                max_space,
                ..
            } => Self::IndexCapacityExceeded {
                prompt_hash,
                max_space,
            },
            LedgerError::DerivationExhausted => Self::DerivationExhausted,
            LedgerError::AccountMismatch { .. }
            | LedgerError::WrongProgram { .. }
            | LedgerError::EmptyTransaction
            | LedgerError::TooManyInstructions { .. }
            | LedgerError::InvalidSignature
            | LedgerError::DuplicateIndexEntry { .. } => Self::InvalidTransaction(e.to_string()),
            LedgerError::UnexpectedAccount { .. }
            | LedgerError::Serialization(_)
            | LedgerError::SnapshotCorrupt(_)
            | LedgerError::StatePoisoned => Self::TransientFailure(e.to_string()),
        }
    }
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::RateLimited(msg) => Self::RateLimited(msg),
            RpcError::Transport(msg) if is_rate_limit_message(&msg) => Self::RateLimited(msg),
            RpcError::Transport(msg) => Self::TransientFailure(msg),
            RpcError::Ledger(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_429_is_rate_limited() {
        let e: ClientError = RpcError::Transport("HTTP 429: slow down".into()).into();
        assert_eq!(e.kind(), ErrorKind::RateLimited);
        let e: ClientError = RpcError::Transport("Too many requests for this IP".into()).into();
        assert_eq!(e.kind(), ErrorKind::RateLimited);
        let e: ClientError = RpcError::Transport("connection reset".into()).into();
        assert_eq!(e, ClientError::TransientFailure("connection reset".into()));
    }

    #[test]
    fn only_rate_limit_and_transient_retry() {
        assert!(ClientError::RateLimited("x".into()).is_retryable());
        assert!(ClientError::TransientFailure("x".into()).is_retryable());
        assert!(!ClientError::AuthorizationUnavailable.is_retryable());
        assert!(!ClientError::ConfirmationTimeout { after_ms: 1 }.is_retryable());
        assert!(!ClientError::AlreadyRegistered {
            address: Address::zero()
        }
        .is_retryable());
    }

    #[test]
    fn ledger_errors_keep_their_meaning() {
        let address = Address::from_raw([1; 32]);
        assert_eq!(
            ClientError::from(LedgerError::AlreadyRegistered { address }),
            ClientError::AlreadyRegistered { address }
        );
        assert_eq!(
            ClientError::from(LedgerError::InvalidSignature).kind(),
            ErrorKind::InvalidTransaction
        );
        assert_eq!(
            ClientError::from(LedgerError::StatePoisoned).kind(),
            ErrorKind::TransientFailure
        );
        assert_eq!(
            ClientError::from(RpcError::Ledger(LedgerError::DerivationExhausted)),
            ClientError::DerivationExhausted
        );
    }

    #[test]
    fn user_messages_distinguish_rate_limits() {
        let limited = ClientError::RateLimited("429".into()).user_message();
        let generic = ClientError::TransientFailure("boom".into()).user_message();
        assert!(limited.starts_with("Rate limit exceeded"));
        assert!(generic.starts_with("Failed to load registry data"));
    }
}
