//! Append-only registry ledger for prompt provenance.
//!
//! This crate is the heart of the registry. It provides:
//! - `Registration` and `PromptIndex` account records
//! - Program-derived account addresses for both record kinds
//! - The transition engine that executes `Register` instructions
//! - `LedgerReader` / `LedgerSubmitter` trait boundaries
//! - `InMemoryLedger`, which serializes and atomically commits transactions
//! - `ContentRegistered` events for off-ledger observers
//! - A registry-wide integrity validator

pub mod addresses;
pub mod clock;
pub mod engine;
pub mod error;
pub mod event;
pub mod memory;
pub mod records;
pub mod traits;
pub mod transaction;
pub mod validation;

pub use addresses::{
    prompt_index_address, registration_address, PROMPT_INDEX_TAG, REGISTRATION_TAG,
    REGISTRY_PROGRAM,
};
pub use clock::{LedgerClock, ManualClock, SystemClock};
pub use engine::{AccountOverlay, RegisterArgs, TransitionEngine};
pub use error::{LedgerError, LedgerResult};
pub use event::{ContentRegistered, EventStream, RegistryEvent};
pub use memory::{InMemoryLedger, LedgerConfig, LedgerSnapshot};
pub use records::{Account, AccountKind, PromptIndex, Registration, StoredAccount};
pub use traits::{LedgerReader, LedgerSubmitter};
pub use transaction::{
    Instruction, SignedTransaction, Transaction, TransactionId, TransactionReceipt,
};
pub use validation::{RegistryValidator, ValidationReport, Violation, ViolationKind};
