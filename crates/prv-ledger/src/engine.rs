//! Registry transition engine.
//!
//! Executes `Register` instructions against an [`AccountOverlay`]: the
//! pending writes of one transaction layered over committed state. The
//! caller commits the overlay only if every instruction succeeded, which is
//! what makes a transaction all-or-nothing.

use std::collections::BTreeMap;

use tracing::debug;

use prv_types::{Address, CreatorId, Fingerprint};

use crate::addresses::{prompt_index_address, registration_address};
use crate::error::{LedgerError, LedgerResult};
use crate::event::ContentRegistered;
use crate::records::{Account, AccountKind, PromptIndex, Registration, StoredAccount};
use crate::transaction::{Instruction, Transaction};

/// Arguments of one registration, validated from raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterArgs {
    pub prompt_hash: Fingerprint,
    pub output_hash: Fingerprint,
}

impl RegisterArgs {
    /// Both slices must be exactly 32 bytes.
    pub fn from_slices(prompt_hash: &[u8], output_hash: &[u8]) -> LedgerResult<Self> {
        let parse = |bytes: &[u8]| {
            Fingerprint::from_slice(bytes).map_err(|_| LedgerError::InvalidFingerprintLength {
                actual: bytes.len(),
            })
        };
        Ok(Self {
            prompt_hash: parse(prompt_hash)?,
            output_hash: parse(output_hash)?,
        })
    }
}

/// Uncommitted account writes of one transaction.
pub struct AccountOverlay<'a> {
    committed: &'a BTreeMap<Address, StoredAccount>,
    pending: BTreeMap<Address, StoredAccount>,
    events: Vec<ContentRegistered>,
}

impl<'a> AccountOverlay<'a> {
    pub fn new(committed: &'a BTreeMap<Address, StoredAccount>) -> Self {
        Self {
            committed,
            pending: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// The account as this transaction currently sees it.
    pub fn get(&self, address: &Address) -> Option<&StoredAccount> {
        self.pending
            .get(address)
            .or_else(|| self.committed.get(address))
    }

    /// Allocate a new account. Fails if anything already lives at `address`.
    fn create(&mut self, address: Address, account: StoredAccount) -> Result<(), Address> {
        if self.get(&address).is_some() {
            return Err(address);
        }
        self.pending.insert(address, account);
        Ok(())
    }

    /// Write an account, replacing (and reallocating) any existing data.
    fn write(&mut self, address: Address, account: StoredAccount) {
        self.pending.insert(address, account);
    }

    fn emit(&mut self, event: ContentRegistered) {
        self.events.push(event);
    }

    /// Number of accounts written so far.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume the overlay, yielding the writes and events to commit.
    pub fn into_parts(self) -> (BTreeMap<Address, StoredAccount>, Vec<ContentRegistered>) {
        (self.pending, self.events)
    }
}

/// Executes registry instructions for one transaction.
pub struct TransitionEngine {
    program: Address,
    now: i64,
    max_account_space: usize,
}

impl TransitionEngine {
    /// `now` is the ledger clock reading shared by every instruction of the
    /// transaction.
    pub fn new(program: Address, now: i64, max_account_space: usize) -> Self {
        Self {
            program,
            now,
            max_account_space,
        }
    }

    /// Run every instruction of `tx` in order. Returns the created
    /// registration addresses. On error the overlay must be discarded.
    pub fn execute(
        &self,
        tx: &Transaction,
        overlay: &mut AccountOverlay<'_>,
    ) -> LedgerResult<Vec<Address>> {
        let mut created = Vec::with_capacity(tx.instructions.len());
        for (index, instruction) in tx.instructions.iter().enumerate() {
            match instruction {
                Instruction::Register {
                    registration,
                    prompt_index,
                    prompt_hash,
                    output_hash,
                } => {
                    let address = self
                        .register(
                            overlay,
                            &tx.creator,
                            RegisterArgs {
                                prompt_hash: *prompt_hash,
                                output_hash: *output_hash,
                            },
                            Some((*registration, *prompt_index)),
                        )
                        .inspect_err(|e| debug!(index, error = %e, "instruction failed"))?;
                    created.push(address);
                }
            }
        }
        Ok(created)
    }

    /// Register `args` for `creator`.
    ///
    /// `supplied` carries the (registration, prompt index) addresses named by
    /// the client, if any; they must match the derivation.
    pub fn register(
        &self,
        overlay: &mut AccountOverlay<'_>,
        creator: &CreatorId,
        args: RegisterArgs,
        supplied: Option<(Address, Address)>,
    ) -> LedgerResult<Address> {
        let reg_addr = registration_address(&self.program, creator, &args.prompt_hash)?;
        let idx_addr = prompt_index_address(&self.program, &args.prompt_hash)?;
        if let Some((supplied_reg, supplied_idx)) = supplied {
            check_account("registration", reg_addr, supplied_reg)?;
            check_account("prompt index", idx_addr, supplied_idx)?;
        }

        let registration = Registration {
            prompt_hash: args.prompt_hash,
            output_hash: args.output_hash,
            creator: *creator,
            timestamp: self.now,
        };
        let data = Account::Registration(registration.clone()).encode()?;
        // The allocation itself is the uniqueness check.
        overlay
            .create(
                reg_addr,
                StoredAccount {
                    owner: self.program,
                    data,
                },
            )
            .map_err(|address| LedgerError::AlreadyRegistered { address })?;

        self.append_to_index(overlay, idx_addr, args.prompt_hash, reg_addr)?;

        overlay.emit(ContentRegistered::from(&registration));
        debug!(
            registration = %reg_addr.short_hex(),
            prompt = %args.prompt_hash.short_hex(),
            "registration staged"
        );
        Ok(reg_addr)
    }

    fn append_to_index(
        &self,
        overlay: &mut AccountOverlay<'_>,
        idx_addr: Address,
        prompt_hash: Fingerprint,
        reg_addr: Address,
    ) -> LedgerResult<()> {
        let index = match overlay.get(&idx_addr) {
            None => PromptIndex::new(prompt_hash, reg_addr),
            Some(stored) => {
                let mut index = stored.decode()?.into_prompt_index().ok_or(
                    LedgerError::UnexpectedAccount {
                        address: idx_addr,
                        expected: AccountKind::PromptIndex,
                    },
                )?;
                let needed = PromptIndex::space_for(index.len() + 1);
                if needed > self.max_account_space {
                    return Err(LedgerError::IndexCapacityExceeded {
                        prompt_hash,
                        entries: index.len(),
                        max_space: self.max_account_space,
                    });
                }
                index.append(reg_addr)?;
                index
            }
        };

        if PromptIndex::space_for(index.len()) > self.max_account_space {
            return Err(LedgerError::IndexCapacityExceeded {
                prompt_hash,
                entries: 0,
                max_space: self.max_account_space,
            });
        }

        let account = StoredAccount {
            owner: self.program,
            data: Account::PromptIndex(index).encode()?,
        };
        overlay.write(idx_addr, account);
        Ok(())
    }
}

fn check_account(role: &'static str, expected: Address, supplied: Address) -> LedgerResult<()> {
    if expected != supplied {
        return Err(LedgerError::AccountMismatch {
            role,
            expected,
            supplied,
        });
    }
    Ok(())
}
