use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use prv_types::{CreatorId, Fingerprint};

use crate::records::Registration;
use crate::transaction::TransactionId;

/// Emitted once for every registration the ledger commits.
///
/// Carries the full new record so that external indexers never need to read
/// the account back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRegistered {
    pub prompt_hash: Fingerprint,
    pub output_hash: Fingerprint,
    pub creator: CreatorId,
    pub timestamp: i64,
}

impl From<&Registration> for ContentRegistered {
    fn from(r: &Registration) -> Self {
        Self {
            prompt_hash: r.prompt_hash,
            output_hash: r.output_hash,
            creator: r.creator,
            timestamp: r.timestamp,
        }
    }
}

/// A [`ContentRegistered`] event stamped with the transaction that committed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    pub transaction_id: TransactionId,
    pub slot: u64,
    pub event: ContentRegistered,
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slot {} tx {} prompt {} by {}",
            self.slot,
            self.transaction_id.short_hex(),
            self.event.prompt_hash.short_hex(),
            self.event.creator.abbreviated()
        )
    }
}

/// A broadcast channel receiver for registry events.
pub type EventStream = broadcast::Receiver<RegistryEvent>;
