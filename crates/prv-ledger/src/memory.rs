use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use prv_crypto::{ContentHasher, VerifyingKey};
use prv_types::Address;

use crate::addresses::REGISTRY_PROGRAM;
use crate::clock::{LedgerClock, SystemClock};
use crate::engine::{AccountOverlay, TransitionEngine};
use crate::error::{LedgerError, LedgerResult};
use crate::event::{EventStream, RegistryEvent};
use crate::records::{Account, AccountKind, StoredAccount};
use crate::traits::{LedgerReader, LedgerSubmitter};
use crate::transaction::{SignedTransaction, TransactionId, TransactionReceipt};

/// Tunables of an [`InMemoryLedger`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Program whose accounts this ledger hosts.
    pub program: Address,
    /// Largest data size any single account may grow to, in bytes.
    pub max_account_space: usize,
    /// Largest number of instructions accepted in one transaction.
    pub max_instructions: usize,
    /// Buffered events per subscriber before slow receivers lag.
    pub event_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            program: REGISTRY_PROGRAM,
            max_account_space: 10 * 1024,
            max_instructions: 10,
            event_capacity: 1024,
        }
    }
}

/// In-memory registry ledger for tests, local tooling, and embedding.
///
/// Every transaction runs under the state write lock, against an overlay of
/// the committed accounts; the overlay is merged only when all instructions
/// succeed.
pub struct InMemoryLedger {
    config: LedgerConfig,
    clock: Arc<dyn LedgerClock>,
    inner: RwLock<LedgerState>,
    events: broadcast::Sender<RegistryEvent>,
}

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<Address, StoredAccount>,
    transactions: BTreeMap<TransactionId, TransactionReceipt>,
    slot: u64,
}

/// Serializable image of a ledger's committed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub program: Address,
    pub slot: u64,
    pub accounts: Vec<(Address, StoredAccount)>,
    pub transactions: Vec<TransactionReceipt>,
    /// Hex BLAKE3 digest over every other field.
    pub digest: String,
}

impl LedgerSnapshot {
    fn compute_digest(
        program: &Address,
        slot: u64,
        accounts: &[(Address, StoredAccount)],
        transactions: &[TransactionReceipt],
    ) -> LedgerResult<String> {
        let hash = ContentHasher::SNAPSHOT
            .hash_json(&(program, slot, accounts, transactions))
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(hex::encode(hash))
    }

    /// Check the digest against the contents.
    pub fn verify(&self) -> LedgerResult<()> {
        let expected =
            Self::compute_digest(&self.program, self.slot, &self.accounts, &self.transactions)?;
        if expected != self.digest {
            return Err(LedgerError::SnapshotCorrupt("digest mismatch".into()));
        }
        Ok(())
    }
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn LedgerClock>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            clock,
            inner: RwLock::new(LedgerState::default()),
            events,
        }
    }

    /// Rebuild a ledger from a snapshot taken by [`snapshot`](Self::snapshot).
    pub fn restore(
        config: LedgerConfig,
        clock: Arc<dyn LedgerClock>,
        snapshot: LedgerSnapshot,
    ) -> LedgerResult<Self> {
        snapshot.verify()?;
        if snapshot.program != config.program {
            return Err(LedgerError::WrongProgram {
                expected: config.program,
                actual: snapshot.program,
            });
        }

        let mut state = LedgerState {
            slot: snapshot.slot,
            ..LedgerState::default()
        };
        for (address, stored) in snapshot.accounts {
            stored.decode().map_err(|e| {
                LedgerError::SnapshotCorrupt(format!("account {address}: {e}"))
            })?;
            if state.accounts.insert(address, stored).is_some() {
                return Err(LedgerError::SnapshotCorrupt(format!(
                    "account {address} listed twice"
                )));
            }
        }
        for receipt in snapshot.transactions {
            state.transactions.insert(receipt.id, receipt);
        }

        let ledger = Self::with_clock(config, clock);
        *ledger.inner.write().map_err(|_| LedgerError::StatePoisoned)? = state;
        debug!(slot = snapshot.slot, "ledger restored from snapshot");
        Ok(ledger)
    }

    /// Capture committed state.
    pub fn snapshot(&self) -> LedgerResult<LedgerSnapshot> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        let accounts: Vec<_> = state
            .accounts
            .iter()
            .map(|(a, s)| (*a, s.clone()))
            .collect();
        let transactions: Vec<_> = state.transactions.values().cloned().collect();
        let digest =
            LedgerSnapshot::compute_digest(&self.config.program, state.slot, &accounts, &transactions)?;
        Ok(LedgerSnapshot {
            program: self.config.program,
            slot: state.slot,
            accounts,
            transactions,
            digest,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Number of committed transactions.
    pub fn slot(&self) -> LedgerResult<u64> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        Ok(state.slot)
    }

    pub fn account_count(&self) -> LedgerResult<usize> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        Ok(state.accounts.len())
    }

    fn check_shape(&self, signed: &SignedTransaction) -> LedgerResult<()> {
        let tx = &signed.transaction;
        if tx.program != self.config.program {
            return Err(LedgerError::WrongProgram {
                expected: self.config.program,
                actual: tx.program,
            });
        }
        if tx.instructions.is_empty() {
            return Err(LedgerError::EmptyTransaction);
        }
        if tx.instructions.len() > self.config.max_instructions {
            return Err(LedgerError::TooManyInstructions {
                count: tx.instructions.len(),
                max: self.config.max_instructions,
            });
        }

        let key = VerifyingKey::from_creator_id(&tx.creator)
            .map_err(|_| LedgerError::InvalidSignature)?;
        key.verify(&tx.message_bytes()?, &signed.signature)
            .map_err(|_| LedgerError::InvalidSignature)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl LedgerSubmitter for InMemoryLedger {
    fn submit(&self, signed: &SignedTransaction) -> LedgerResult<TransactionReceipt> {
        self.check_shape(signed)?;
        let tx = &signed.transaction;
        let id = signed.id();

        let mut state = self.inner.write().map_err(|_| LedgerError::StatePoisoned)?;
        let now = self.clock.unix_timestamp();
        let engine = TransitionEngine::new(self.config.program, now, self.config.max_account_space);

        let (writes, events, registrations) = {
            let mut overlay = AccountOverlay::new(&state.accounts);
            let registrations = engine.execute(tx, &mut overlay).inspect_err(|e| {
                warn!(tx = %id.short_hex(), error = %e, "transaction rejected");
            })?;
            let (writes, events) = overlay.into_parts();
            (writes, events, registrations)
        };

        state.accounts.extend(writes);
        state.slot += 1;
        let receipt = TransactionReceipt {
            id,
            slot: state.slot,
            block_time: now,
            creator: tx.creator,
            registrations,
        };
        state.transactions.insert(id, receipt.clone());

        // Still under the write lock, so subscribers see slot order.
        for event in events {
            let _ = self.events.send(RegistryEvent {
                transaction_id: id,
                slot: receipt.slot,
                event,
            });
        }

        info!(
            tx = %id.short_hex(),
            slot = receipt.slot,
            creator = %tx.creator.abbreviated(),
            registrations = receipt.registrations.len(),
            "transaction committed"
        );
        Ok(receipt)
    }
}

impl LedgerReader for InMemoryLedger {
    fn fetch_account(&self, address: &Address) -> LedgerResult<Option<Account>> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        state
            .accounts
            .get(address)
            .map(StoredAccount::decode)
            .transpose()
    }

    fn fetch_all(&self, kind: AccountKind) -> LedgerResult<Vec<(Address, Account)>> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        let mut out = Vec::new();
        for (address, stored) in &state.accounts {
            let account = stored.decode()?;
            if account.kind() == kind {
                out.push((*address, account));
            }
        }
        Ok(out)
    }

    fn transaction(&self, id: &TransactionId) -> LedgerResult<Option<TransactionReceipt>> {
        let state = self.inner.read().map_err(|_| LedgerError::StatePoisoned)?;
        Ok(state.transactions.get(id).cloned())
    }
}
