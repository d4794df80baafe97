//! Batch registration: several (prompt, output) pairs in one atomic
//! transaction.

use tracing::info;

use prv_ledger::{Instruction, Transaction, TransactionReceipt};
use prv_types::{Address, CreatorId, Fingerprint};

use crate::client::ProvenanceClient;
use crate::error::{ClientError, ClientResult};

pub const MIN_BATCH_SIZE: usize = 2;
pub const MAX_BATCH_SIZE: usize = 10;

/// One item of a batch, either as text or as precomputed fingerprints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchItem {
    Text { prompt: String, output: String },
    Hashed {
        prompt_hash: Fingerprint,
        output_hash: Fingerprint,
    },
}

impl BatchItem {
    pub fn text(prompt: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Text {
            prompt: prompt.into(),
            output: output.into(),
        }
    }

    pub fn hashed(prompt_hash: Fingerprint, output_hash: Fingerprint) -> Self {
        Self::Hashed {
            prompt_hash,
            output_hash,
        }
    }

    /// `(prompt_hash, output_hash)`.
    pub fn fingerprints(&self) -> (Fingerprint, Fingerprint) {
        match self {
            Self::Text { prompt, output } => {
                (Fingerprint::of_text(prompt), Fingerprint::of_text(output))
            }
            Self::Hashed {
                prompt_hash,
                output_hash,
            } => (*prompt_hash, *output_hash),
        }
    }
}

/// Assemble an unsigned transaction with one `Register` instruction per item.
pub fn build_batch(
    program: &Address,
    creator: &CreatorId,
    items: &[BatchItem],
) -> ClientResult<Transaction> {
    if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&items.len()) {
        return Err(ClientError::BatchSizeInvalid {
            count: items.len(),
            min: MIN_BATCH_SIZE,
            max: MAX_BATCH_SIZE,
        });
    }

    let mut tx = Transaction::new(*program, *creator);
    for item in items {
        let (prompt_hash, output_hash) = item.fingerprints();
        tx.push(Instruction::register(
            program,
            creator,
            prompt_hash,
            output_hash,
        )?);
    }
    Ok(tx)
}

impl ProvenanceClient {
    /// Register 2 to 10 items atomically: all commit or none do.
    pub async fn register_batch(&self, items: &[BatchItem]) -> ClientResult<TransactionReceipt> {
        let creator = self.creator()?;
        let tx = build_batch(&self.program(), &creator, items)?;
        let receipt = self.submit(tx).await?;
        info!(
            tx = %receipt.id.short_hex(),
            items = receipt.registrations.len(),
            "batch registered"
        );
        Ok(receipt)
    }
}
