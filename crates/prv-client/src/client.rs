use std::sync::Arc;

use tracing::debug;

use prv_ledger::{LedgerReader, LedgerSubmitter, Transaction, TransactionReceipt};
use prv_types::{Address, CreatorId};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::registry::RegistryReader;
use crate::rpc::{LocalRpc, RegistryRpc};
use crate::signer::{sign_transaction, TransactionSigner};

/// Entry point for applications talking to the registry.
///
/// Registration methods live in `register` and `batch`, queries in
/// `verify`, certificate issuance in `certificate`.
pub struct ProvenanceClient {
    pub(crate) rpc: Arc<dyn RegistryRpc>,
    signer: Option<Arc<dyn TransactionSigner>>,
    config: ClientConfig,
}

impl ProvenanceClient {
    /// A read-only client. Submissions fail until a signer is attached.
    pub fn new(rpc: Arc<dyn RegistryRpc>, config: ClientConfig) -> Self {
        Self {
            rpc,
            signer: None,
            config,
        }
    }

    /// A client for a ledger running in this process.
    pub fn local<L>(ledger: Arc<L>, config: ClientConfig) -> Self
    where
        L: LedgerReader + LedgerSubmitter + 'static,
    {
        Self::new(Arc::new(LocalRpc::new(ledger)), config)
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn program(&self) -> Address {
        self.config.program
    }

    pub fn rpc(&self) -> &Arc<dyn RegistryRpc> {
        &self.rpc
    }

    /// Identity of the attached signer.
    pub fn creator(&self) -> ClientResult<CreatorId> {
        self.signer
            .as_ref()
            .map(|s| s.creator())
            .ok_or(ClientError::AuthorizationUnavailable)
    }

    /// A resilient reader sharing this client's transport.
    pub fn reader(&self) -> RegistryReader {
        RegistryReader::new(Arc::clone(&self.rpc), &self.config.reader)
    }

    /// Sign and submit `tx`, waiting at most `submit_timeout` for the receipt.
    pub(crate) async fn submit(&self, tx: Transaction) -> ClientResult<TransactionReceipt> {
        let signer = self
            .signer
            .as_deref()
            .ok_or(ClientError::AuthorizationUnavailable)?;
        let signed = sign_transaction(signer, tx)?;
        let id = signed.id();
        debug!(
            tx = %id.short_hex(),
            instructions = signed.transaction.instructions.len(),
            "submitting transaction"
        );

        let timeout = self.config.submit_timeout();
        match tokio::time::timeout(timeout, self.rpc.submit(&signed)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClientError::ConfirmationTimeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
