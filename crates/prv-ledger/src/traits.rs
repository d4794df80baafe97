use prv_types::Address;

use crate::error::{LedgerError, LedgerResult};
use crate::records::{Account, AccountKind, PromptIndex, Registration};
use crate::transaction::{SignedTransaction, TransactionId, TransactionReceipt};

/// Read boundary for registry account queries.
pub trait LedgerReader: Send + Sync {
    /// Decoded account at `address`, if one exists.
    fn fetch_account(&self, address: &Address) -> LedgerResult<Option<Account>>;

    /// Every account of `kind`, ordered by address.
    fn fetch_all(&self, kind: AccountKind) -> LedgerResult<Vec<(Address, Account)>>;

    /// Receipt of a committed transaction.
    fn transaction(&self, id: &TransactionId) -> LedgerResult<Option<TransactionReceipt>>;

    /// Like [`fetch_account`](Self::fetch_account), but requires a `Registration`.
    fn fetch_registration(&self, address: &Address) -> LedgerResult<Option<Registration>> {
        match self.fetch_account(address)? {
            None => Ok(None),
            Some(Account::Registration(r)) => Ok(Some(r)),
            Some(_) => Err(LedgerError::UnexpectedAccount {
                address: *address,
                expected: AccountKind::Registration,
            }),
        }
    }

    /// Like [`fetch_account`](Self::fetch_account), but requires a `PromptIndex`.
    fn fetch_prompt_index(&self, address: &Address) -> LedgerResult<Option<PromptIndex>> {
        match self.fetch_account(address)? {
            None => Ok(None),
            Some(Account::PromptIndex(i)) => Ok(Some(i)),
            Some(_) => Err(LedgerError::UnexpectedAccount {
                address: *address,
                expected: AccountKind::PromptIndex,
            }),
        }
    }
}

/// Write boundary: the only way state enters the ledger.
pub trait LedgerSubmitter: Send + Sync {
    /// Verify, execute and commit `tx` atomically across all its instructions.
    fn submit(&self, tx: &SignedTransaction) -> LedgerResult<TransactionReceipt>;
}
