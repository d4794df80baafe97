use serde::{Deserialize, Serialize};

use prv_types::{Address, CreatorId, Fingerprint};

use crate::error::{LedgerError, LedgerResult};

/// Encoded size of the account kind tag (bincode enum variant index).
const KIND_TAG_LEN: usize = 4;
/// Encoded size of a `Vec` length prefix.
const VEC_LEN_PREFIX: usize = 8;

/// The immutable fact that `creator` registered `prompt_hash` with `output_hash`.
///
/// Stored at `derive("registration", creator, prompt_hash)`. Written exactly
/// once by the transition engine and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub prompt_hash: Fingerprint,
    pub output_hash: Fingerprint,
    pub creator: CreatorId,
    /// Ledger clock at creation, unix seconds.
    pub timestamp: i64,
}

impl Registration {
    /// Account space of an encoded registration.
    pub const SPACE: usize = KIND_TAG_LEN + 32 + 32 + 32 + 8;
}

/// Append-only list of every registration sharing one prompt fingerprint.
///
/// Stored at `derive("prompt_index", prompt_hash)`. Entries keep insertion
/// order and are never removed or reordered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptIndex {
    pub prompt_hash: Fingerprint,
    registrations: Vec<Address>,
}

impl PromptIndex {
    /// A new index holding a single registration.
    pub fn new(prompt_hash: Fingerprint, first: Address) -> Self {
        Self {
            prompt_hash,
            registrations: vec![first],
        }
    }

    /// Account space needed by an index with `entries` registrations.
    pub const fn space_for(entries: usize) -> usize {
        KIND_TAG_LEN + 32 + VEC_LEN_PREFIX + 32 * entries
    }

    /// Largest number of entries that fits in `max_space` bytes.
    pub const fn capacity(max_space: usize) -> usize {
        let base = Self::space_for(0);
        if max_space < base {
            0
        } else {
            (max_space - base) / 32
        }
    }

    /// Registration addresses in registration order.
    pub fn registrations(&self) -> &[Address] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.registrations.contains(address)
    }

    #[cfg(test)]
    pub(crate) fn from_entries(prompt_hash: Fingerprint, registrations: Vec<Address>) -> Self {
        Self {
            prompt_hash,
            registrations,
        }
    }

    /// Append one registration address.
    pub(crate) fn append(&mut self, address: Address) -> LedgerResult<()> {
        if self.contains(&address) {
            return Err(LedgerError::DuplicateIndexEntry { address });
        }
        self.registrations.push(address);
        Ok(())
    }
}

/// Discriminates the record types stored in registry accounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    Registration,
    PromptIndex,
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Registration => "registration",
            Self::PromptIndex => "prompt_index",
        };
        write!(f, "{s}")
    }
}

/// A decoded registry account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Account {
    Registration(Registration),
    PromptIndex(PromptIndex),
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Registration(_) => AccountKind::Registration,
            Self::PromptIndex(_) => AccountKind::PromptIndex,
        }
    }

    pub fn as_registration(&self) -> Option<&Registration> {
        match self {
            Self::Registration(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_prompt_index(&self) -> Option<&PromptIndex> {
        match self {
            Self::PromptIndex(i) => Some(i),
            _ => None,
        }
    }

    pub fn into_registration(self) -> Option<Registration> {
        match self {
            Self::Registration(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_prompt_index(self) -> Option<PromptIndex> {
        match self {
            Self::PromptIndex(i) => Some(i),
            _ => None,
        }
    }

    /// Encode to account data.
    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode account data.
    pub fn decode(data: &[u8]) -> LedgerResult<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Raw account as held in the ledger's address space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    /// Program that owns, and alone may write, this account.
    pub owner: Address,
    /// Encoded [`Account`]. Its length is the account's allocated space.
    pub data: Vec<u8>,
}

impl StoredAccount {
    pub fn space(&self) -> usize {
        self.data.len()
    }

    pub fn decode(&self) -> LedgerResult<Account> {
        Account::decode(&self.data)
    }
}
