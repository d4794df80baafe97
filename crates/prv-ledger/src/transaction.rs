use std::fmt;

use serde::{Deserialize, Serialize};

use prv_crypto::{ContentHasher, Signature, SigningKey};
use prv_types::{Address, CreatorId, Fingerprint, TypeError};

use crate::addresses::{prompt_index_address, registration_address};
use crate::error::LedgerResult;

/// One step of a ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Register `prompt_hash` / `output_hash` for the transaction's creator.
    ///
    /// The account addresses are supplied by the client and checked against
    /// their derivation by the engine.
    Register {
        registration: Address,
        prompt_index: Address,
        prompt_hash: Fingerprint,
        output_hash: Fingerprint,
    },
}

impl Instruction {
    /// Build a `Register` instruction with freshly derived account addresses.
    pub fn register(
        program: &Address,
        creator: &CreatorId,
        prompt_hash: Fingerprint,
        output_hash: Fingerprint,
    ) -> LedgerResult<Self> {
        Ok(Self::Register {
            registration: registration_address(program, creator, &prompt_hash)?,
            prompt_index: prompt_index_address(program, &prompt_hash)?,
            prompt_hash,
            output_hash,
        })
    }
}

/// An unsigned, ordered list of instructions authorized by one creator.
///
/// The ledger executes all instructions of a transaction atomically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub program: Address,
    pub creator: CreatorId,
    pub instructions: Vec<Instruction>,
    /// Distinguishes otherwise identical transactions.
    pub nonce: u64,
}

impl Transaction {
    pub fn new(program: Address, creator: CreatorId) -> Self {
        Self {
            program,
            creator,
            instructions: Vec::new(),
            nonce: rand::random(),
        }
    }

    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Canonical bytes covered by the creator's signature.
    pub fn message_bytes(&self) -> LedgerResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Sign with a local key. The key must belong to `self.creator`.
    pub fn sign(self, key: &SigningKey) -> LedgerResult<SignedTransaction> {
        let message = self.message_bytes()?;
        Ok(SignedTransaction::new(self, key.sign(&message)))
    }
}

/// A transaction together with its creator's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction, signature: Signature) -> Self {
        Self {
            transaction,
            signature,
        }
    }

    /// Identifier of this transaction, derived from its signature.
    pub fn id(&self) -> TransactionId {
        TransactionId(ContentHasher::TRANSACTION.hash(&self.signature.to_bytes()))
    }
}

/// Identifier covering every instruction of one submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.short_hex())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// What the ledger reports back for a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub id: TransactionId,
    /// Sequence number of the commit.
    pub slot: u64,
    /// Ledger clock at commit, unix seconds.
    pub block_time: i64,
    pub creator: CreatorId,
    /// Registration accounts created by this transaction, in instruction order.
    pub registrations: Vec<Address>,
}
