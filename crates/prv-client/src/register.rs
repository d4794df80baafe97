use tracing::info;

use prv_ledger::{Instruction, RegisterArgs, Transaction, TransactionReceipt};
use prv_types::Fingerprint;

use crate::client::ProvenanceClient;
use crate::error::ClientResult;

impl ProvenanceClient {
    /// Register one (prompt, output) fingerprint pair for the signer.
    pub async fn register(
        &self,
        prompt_hash: Fingerprint,
        output_hash: Fingerprint,
    ) -> ClientResult<TransactionReceipt> {
        let creator = self.creator()?;
        let program = self.program();
        let tx = Transaction::new(program, creator).with_instruction(Instruction::register(
            &program,
            &creator,
            prompt_hash,
            output_hash,
        )?);

        let receipt = self.submit(tx).await?;
        info!(
            tx = %receipt.id.short_hex(),
            prompt = %prompt_hash.short_hex(),
            "prompt registered"
        );
        Ok(receipt)
    }

    /// Fingerprint both texts and register them.
    pub async fn register_text(&self, prompt: &str, output: &str) -> ClientResult<TransactionReceipt> {
        self.register(Fingerprint::of_text(prompt), Fingerprint::of_text(output))
            .await
    }

    /// Register digests given as raw byte slices, which must be 32 bytes each.
    pub async fn register_slices(
        &self,
        prompt_hash: &[u8],
        output_hash: &[u8],
    ) -> ClientResult<TransactionReceipt> {
        let args = RegisterArgs::from_slices(prompt_hash, output_hash)?;
        self.register(args.prompt_hash, args.output_hash).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use prv_crypto::SigningKey;
    use prv_ledger::{registration_address, LedgerReader, REGISTRY_PROGRAM};

    use crate::config::ClientConfig;
    use crate::error::ClientError;
    use crate::testing::{client, ledger, ScriptedRpc, START};

    use super::*;

    #[tokio::test]
    async fn registers_under_the_derived_address() {
        let (ledger, _) = ledger();
        let key = SigningKey::generate();
        let creator = key.creator_id();
        let client = client(&ledger, key);

        let receipt = client
            .register_text("Write a poem about cats", "Cats are fluffy...")
            .await
            .unwrap();

        let expected = registration_address(
            &REGISTRY_PROGRAM,
            &creator,
            &Fingerprint::of_text("Write a poem about cats"),
        )
        .unwrap();
        assert_eq!(receipt.registrations, vec![expected]);
        let record = ledger.fetch_registration(&expected).unwrap().unwrap();
        assert_eq!(record.timestamp, START);
    }

    #[tokio::test]
    async fn second_registration_is_rejected() {
        let (ledger, _) = ledger();
        let client = client(&ledger, SigningKey::generate());
        client.register_text("p", "o").await.unwrap();

        let err = client.register_text("p", "o2").await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadyRegistered { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn registration_needs_a_signer() {
        let (ledger, _) = ledger();
        let client = ProvenanceClient::local(ledger.clone(), ClientConfig::default());
        assert_eq!(
            client.register_text("p", "o").await.unwrap_err(),
            ClientError::AuthorizationUnavailable
        );
        assert_eq!(ledger.slot().unwrap(), 0);
    }

    #[tokio::test]
    async fn slices_must_be_32_bytes() {
        let (ledger, _) = ledger();
        let client = client(&ledger, SigningKey::generate());
        assert_eq!(
            client.register_slices(&[1; 16], &[2; 32]).await.unwrap_err(),
            ClientError::InvalidFingerprintLength { actual: 16 }
        );
        assert!(client.register_slices(&[1; 32], &[2; 32]).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_confirmation_times_out() {
        let (ledger, _) = ledger();
        let rpc = ScriptedRpc::new(ledger).slow_submit(Duration::from_secs(60));
        let client = ProvenanceClient::new(Arc::new(rpc), ClientConfig::default())
            .with_signer(Arc::new(SigningKey::generate()));

        assert_eq!(
            client.register_text("p", "o").await.unwrap_err(),
            ClientError::ConfirmationTimeout { after_ms: 30_000 }
        );
    }
}
