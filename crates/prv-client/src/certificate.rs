//! Provenance certificates: self-contained JSON documents attesting that a
//! registration exists, which anyone can check structurally offline and
//! against the ledger online.

use serde::{Deserialize, Serialize};

use prv_crypto::ContentHasher;
use prv_ledger::TransactionId;
use prv_types::Address;

use crate::client::ProvenanceClient;
use crate::entry::RegistryEntry;
use crate::error::{ClientError, ClientResult};

pub const CERTIFICATE_VERSION: &str = "1.0.0";

/// Length of a certificate id in hex characters.
const CERTIFICATE_ID_LEN: usize = 16;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    pub prompt_hash: String,
    pub output_hash: String,
    pub creator: String,
    /// Registration time, unix seconds.
    pub timestamp: i64,
    /// Commit time of the registering transaction, unix seconds.
    pub block_time: i64,
    pub transaction_id: String,
    pub program_id: String,
    pub certificate_id: String,
    /// Unix milliseconds.
    pub generated_at: i64,
    pub version: String,
}

impl Certificate {
    pub fn generate(
        entry: &RegistryEntry,
        program: &Address,
        transaction_id: &TransactionId,
        block_time: i64,
        generated_at_ms: i64,
    ) -> Self {
        let creator = entry.registration.creator.to_hex();
        let transaction_id = transaction_id.to_hex();
        let certificate_id =
            Self::compute_id(&creator, entry.registration.timestamp, &transaction_id);
        Self {
            prompt_hash: entry.registration.prompt_hash.to_hex(),
            output_hash: entry.registration.output_hash.to_hex(),
            creator,
            timestamp: entry.registration.timestamp,
            block_time,
            transaction_id,
            program_id: program.to_hex(),
            certificate_id,
            generated_at: generated_at_ms,
            version: CERTIFICATE_VERSION.to_string(),
        }
    }

    /// First 16 hex characters of the domain-separated BLAKE3 hash of
    /// `creator-timestamp-transaction_id`.
    pub fn compute_id(creator: &str, timestamp: i64, transaction_id: &str) -> String {
        let data = format!("{creator}-{timestamp}-{transaction_id}");
        let mut id = ContentHasher::CERTIFICATE.hash_hex(data.as_bytes());
        id.truncate(CERTIFICATE_ID_LEN);
        id
    }

    /// Structural checks only; nothing here touches the ledger.
    pub fn validate(&self, now_secs: i64) -> CertificateReport {
        let mut issues = Vec::new();
        let required = [
            (self.prompt_hash.is_empty(), "Missing prompt hash"),
            (self.output_hash.is_empty(), "Missing output hash"),
            (self.creator.is_empty(), "Missing creator"),
            (self.timestamp == 0, "Missing timestamp"),
            (self.transaction_id.is_empty(), "Missing transaction id"),
            (self.certificate_id.is_empty(), "Missing certificate id"),
            (self.version.is_empty(), "Missing version"),
        ];
        issues.extend(
            required
                .iter()
                .filter(|(missing, _)| *missing)
                .map(|(_, issue)| issue.to_string()),
        );

        if self.timestamp > now_secs {
            issues.push("Invalid timestamp: future date".into());
        }
        if !self.prompt_hash.is_empty() && !is_hex(&self.prompt_hash) {
            issues.push("Invalid prompt hash format".into());
        }
        if !self.output_hash.is_empty() && !is_hex(&self.output_hash) {
            issues.push("Invalid output hash format".into());
        }
        if !self.certificate_id.is_empty()
            && self.certificate_id
                != Self::compute_id(&self.creator, self.timestamp, &self.transaction_id)
        {
            issues.push("Certificate id does not match its contents".into());
        }

        CertificateReport { issues }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Suggested file name for an exported certificate.
    pub fn file_name(&self) -> String {
        format!("provenance-certificate-{}.json", self.certificate_id)
    }
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Every structural problem found in a certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateReport {
    pub issues: Vec<String>,
}

impl CertificateReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl ProvenanceClient {
    /// Issue a certificate for `entry`, which must have been created by
    /// transaction `transaction_id`.
    pub async fn issue_certificate(
        &self,
        entry: &RegistryEntry,
        transaction_id: &TransactionId,
        generated_at_ms: i64,
    ) -> ClientResult<Certificate> {
        let receipt = self
            .rpc
            .transaction(transaction_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("transaction {transaction_id}")))?;
        if !receipt.registrations.contains(&entry.address) {
            return Err(ClientError::NotFound(format!(
                "registration {} in transaction {}",
                entry.address.short_hex(),
                transaction_id.short_hex()
            )));
        }
        Ok(Certificate::generate(
            entry,
            &self.program(),
            transaction_id,
            receipt.block_time,
            generated_at_ms,
        ))
    }
}
