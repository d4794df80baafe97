use prv_crypto::{Signature, SigningKey};
use prv_ledger::{SignedTransaction, Transaction};
use prv_types::CreatorId;

use crate::error::ClientResult;

/// Authorizes transactions on behalf of one creator.
pub trait TransactionSigner: Send + Sync {
    /// Identity the signatures verify against.
    fn creator(&self) -> CreatorId;

    fn sign(&self, message: &[u8]) -> Signature;
}

impl TransactionSigner for SigningKey {
    fn creator(&self) -> CreatorId {
        self.creator_id()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        SigningKey::sign(self, message)
    }
}

/// Sign `tx` with `signer`.
pub fn sign_transaction(
    signer: &dyn TransactionSigner,
    tx: Transaction,
) -> ClientResult<SignedTransaction> {
    let message = tx.message_bytes()?;
    let signature = signer.sign(&message);
    Ok(SignedTransaction::new(tx, signature))
}
