//! Client for the prompt provenance registry.
//!
//! [`ProvenanceClient`] registers prompts (singly or in atomic batches),
//! verifies them, and issues certificates. [`RegistryReader`] enumerates the
//! whole registry under rate limits and transient failures. Both talk to the
//! ledger through the [`RegistryRpc`] transport.

pub mod batch;
pub mod certificate;
pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod lookup;
pub mod register;
pub mod registry;
pub mod retry;
pub mod rpc;
pub mod signer;
pub mod stats;
pub mod verify;

#[cfg(test)]
mod testing;

pub use batch::{build_batch, BatchItem, MAX_BATCH_SIZE, MIN_BATCH_SIZE};
pub use certificate::{Certificate, CertificateReport, CERTIFICATE_VERSION};
pub use client::ProvenanceClient;
pub use config::{ClientConfig, ConfigError, ReaderConfig};
pub use entry::RegistryEntry;
pub use error::{ClientError, ClientResult, ErrorKind, RpcError, RpcResult};
pub use lookup::Lookup;
pub use registry::{ReaderState, RefreshOutcome, RegistryReader, RegistrySnapshot, SkipReason};
pub use retry::BackoffPolicy;
pub use rpc::{LocalRpc, RegistryRpc};
pub use signer::{sign_transaction, TransactionSigner};
pub use stats::{ActivityLevel, CreatorStats};

// Re-export the types callers need alongside the client.
pub use prv_crypto::SigningKey;
pub use prv_ledger::{TransactionId, TransactionReceipt};
pub use prv_types::{Address, CreatorId, Fingerprint};
