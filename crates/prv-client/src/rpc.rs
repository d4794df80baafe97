use std::sync::Arc;

use async_trait::async_trait;

use prv_ledger::{
    Account, AccountKind, LedgerReader, LedgerSubmitter, SignedTransaction, TransactionId,
    TransactionReceipt,
};
use prv_types::Address;

use crate::error::RpcResult;

/// Transport interface to a registry ledger.
#[async_trait]
pub trait RegistryRpc: Send + Sync {
    async fn fetch_account(&self, address: &Address) -> RpcResult<Option<Account>>;
    async fn fetch_all(&self, kind: AccountKind) -> RpcResult<Vec<(Address, Account)>>;
    async fn transaction(&self, id: &TransactionId) -> RpcResult<Option<TransactionReceipt>>;
    async fn submit(&self, tx: &SignedTransaction) -> RpcResult<TransactionReceipt>;
}

/// Adapts an in-process ledger to [`RegistryRpc`].
pub struct LocalRpc<L> {
    ledger: Arc<L>,
}

impl<L> LocalRpc<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }
}

impl<L> Clone for LocalRpc<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

#[async_trait]
impl<L> RegistryRpc for LocalRpc<L>
where
    L: LedgerReader + LedgerSubmitter + 'static,
{
    async fn fetch_account(&self, address: &Address) -> RpcResult<Option<Account>> {
        Ok(self.ledger.fetch_account(address)?)
    }

    async fn fetch_all(&self, kind: AccountKind) -> RpcResult<Vec<(Address, Account)>> {
        Ok(self.ledger.fetch_all(kind)?)
    }

    async fn transaction(&self, id: &TransactionId) -> RpcResult<Option<TransactionReceipt>> {
        Ok(self.ledger.transaction(id)?)
    }

    async fn submit(&self, tx: &SignedTransaction) -> RpcResult<TransactionReceipt> {
        Ok(self.ledger.submit(tx)?)
    }
}
