//! Read-only provenance queries.
//!
//! The prompt index is the source of truth for "who registered this prompt";
//! the direct lookup by creator is a shortcut to the same registration record.

use tracing::{debug, warn};

use prv_ledger::{
    prompt_index_address, registration_address, Account, AccountKind, LedgerError, PromptIndex,
};
use prv_types::{CreatorId, Fingerprint};

use crate::client::ProvenanceClient;
use crate::entry::RegistryEntry;
use crate::error::{ClientError, ClientResult};
use crate::lookup::Lookup;

impl ProvenanceClient {
    /// Every registration of `prompt_hash`, in registration order.
    pub async fn verify_by_fingerprint(&self, prompt_hash: &Fingerprint) -> Lookup<Vec<RegistryEntry>> {
        self.resolve_prompt(prompt_hash).await.into()
    }

    /// Fingerprint `prompt` and look it up.
    pub async fn verify_text(&self, prompt: &str) -> Lookup<Vec<RegistryEntry>> {
        self.verify_by_fingerprint(&Fingerprint::of_text(prompt))
            .await
    }

    /// Look up a digest given as a raw byte slice.
    pub async fn verify_slice(&self, prompt_hash: &[u8]) -> Lookup<Vec<RegistryEntry>> {
        match Fingerprint::from_slice(prompt_hash) {
            Ok(fp) => self.verify_by_fingerprint(&fp).await,
            Err(_) => Lookup::Error(ClientError::InvalidFingerprintLength {
                actual: prompt_hash.len(),
            }),
        }
    }

    /// The registration of `prompt_hash` by `creator`, if any.
    pub async fn verify_direct(
        &self,
        creator: &CreatorId,
        prompt_hash: &Fingerprint,
    ) -> Lookup<RegistryEntry> {
        self.resolve_direct(creator, prompt_hash).await.into()
    }

    async fn resolve_direct(
        &self,
        creator: &CreatorId,
        prompt_hash: &Fingerprint,
    ) -> ClientResult<Option<RegistryEntry>> {
        let address = registration_address(&self.program(), creator, prompt_hash)?;
        match self.rpc.fetch_account(&address).await? {
            None => Ok(None),
            Some(Account::Registration(r)) => Ok(Some(RegistryEntry::new(address, r))),
            Some(_) => Err(LedgerError::UnexpectedAccount {
                address,
                expected: AccountKind::Registration,
            }
            .into()),
        }
    }

    async fn resolve_prompt(
        &self,
        prompt_hash: &Fingerprint,
    ) -> ClientResult<Option<Vec<RegistryEntry>>> {
        let Some(index) = self.fetch_index(prompt_hash).await? else {
            return Ok(None);
        };
        if index.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(index.len());
        for address in index.registrations() {
            match self.rpc.fetch_account(address).await {
                Ok(Some(Account::Registration(r))) => {
                    entries.push(RegistryEntry::new(*address, r));
                }
                Ok(Some(other)) => {
                    warn!(address = %address.short_hex(), kind = %other.kind(), "index entry is not a registration, skipping");
                }
                Ok(None) => {
                    warn!(address = %address.short_hex(), "index entry has no account, skipping");
                }
                Err(e) => {
                    warn!(address = %address.short_hex(), error = %e, "failed to resolve index entry, skipping");
                }
            }
        }

        // The index still proves the prompt was registered, even when none
        // of its entries could be read back.
        debug!(prompt = %prompt_hash.short_hex(), entries = entries.len(), "prompt verified");
        Ok(Some(entries))
    }

    async fn fetch_index(&self, prompt_hash: &Fingerprint) -> ClientResult<Option<PromptIndex>> {
        let address = prompt_index_address(&self.program(), prompt_hash)?;
        match self.rpc.fetch_account(&address).await? {
            None => Ok(None),
            Some(Account::PromptIndex(index)) => Ok(Some(index)),
            Some(_) => Err(LedgerError::UnexpectedAccount {
                address,
                expected: AccountKind::PromptIndex,
            }
            .into()),
        }
    }
}
