//! Fixtures shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use prv_crypto::SigningKey;
use prv_ledger::{
    Account, AccountKind, InMemoryLedger, LedgerConfig, ManualClock, SignedTransaction,
    TransactionId, TransactionReceipt,
};
use prv_types::Address;

use crate::client::ProvenanceClient;
use crate::config::ClientConfig;
use crate::error::{RpcError, RpcResult};
use crate::rpc::{LocalRpc, RegistryRpc};

pub const START: i64 = 1_700_000_000;

pub fn ledger() -> (Arc<InMemoryLedger>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let ledger = Arc::new(InMemoryLedger::with_clock(
        LedgerConfig::default(),
        clock.clone(),
    ));
    (ledger, clock)
}

pub fn client(ledger: &Arc<InMemoryLedger>, key: SigningKey) -> ProvenanceClient {
    ProvenanceClient::local(Arc::clone(ledger), ClientConfig::default()).with_signer(Arc::new(key))
}

/// Local transport with injectable failures, overrides and pauses.
pub struct ScriptedRpc {
    inner: LocalRpc<InMemoryLedger>,
    fetch_all_failures: Mutex<VecDeque<RpcError>>,
    overrides: Mutex<HashMap<Address, RpcResult<Option<Account>>>>,
    pub fetch_all_calls: AtomicUsize,
    /// Notified whenever `fetch_all` starts.
    pub started: Notify,
    /// When set, `fetch_all` waits for a permit before answering.
    gate: Option<Notify>,
    submit_delay: Option<Duration>,
}

impl ScriptedRpc {
    pub fn new(ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            inner: LocalRpc::new(ledger),
            fetch_all_failures: Mutex::new(VecDeque::new()),
            overrides: Mutex::new(HashMap::new()),
            fetch_all_calls: AtomicUsize::new(0),
            started: Notify::new(),
            gate: None,
            submit_delay: None,
        }
    }

    pub fn failing(self, failures: impl IntoIterator<Item = RpcError>) -> Self {
        self.fail_next(failures);
        self
    }

    /// Queue errors for the next `fetch_all` calls.
    pub fn fail_next(&self, failures: impl IntoIterator<Item = RpcError>) {
        self.fetch_all_failures.lock().unwrap().extend(failures);
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn slow_submit(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn override_account(&self, address: Address, result: RpcResult<Option<Account>>) {
        self.overrides.lock().unwrap().insert(address, result);
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryRpc for ScriptedRpc {
    async fn fetch_account(&self, address: &Address) -> RpcResult<Option<Account>> {
        let scripted = self.overrides.lock().unwrap().get(address).cloned();
        match scripted {
            Some(result) => result,
            None => self.inner.fetch_account(address).await,
        }
    }

    async fn fetch_all(&self, kind: AccountKind) -> RpcResult<Vec<(Address, Account)>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let failure = self.fetch_all_failures.lock().unwrap().pop_front();
        match failure {
            Some(e) => Err(e),
            None => self.inner.fetch_all(kind).await,
        }
    }

    async fn transaction(&self, id: &TransactionId) -> RpcResult<Option<TransactionReceipt>> {
        self.inner.transaction(id).await
    }

    async fn submit(&self, tx: &SignedTransaction) -> RpcResult<TransactionReceipt> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.submit(tx).await
    }
}
