/// BLAKE3 with a domain tag, so the same bytes hashed for two purposes
/// (a transaction id and a certificate id, say) never collide.
///
/// The digest is `BLAKE3(domain ‖ ":" ‖ data)`.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Transaction ids.
    pub const TRANSACTION: Self = Self::new("prv-transaction-v1");
    /// Certificate ids.
    pub const CERTIFICATE: Self = Self::new("prv-certificate-v1");
    /// Ledger snapshot digests.
    pub const SNAPSHOT: Self = Self::new("prv-snapshot-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        blake3::Hasher::new()
            .update(self.domain.as_bytes())
            .update(b":")
            .update(data)
            .finalize()
            .into()
    }

    /// Lowercase hex of [`hash`](Self::hash).
    pub fn hash_hex(&self, data: &[u8]) -> String {
        hex::encode(self.hash(data))
    }

    /// Hash the compact JSON encoding of `value`.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<[u8; 32], HasherError> {
        let encoded = serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&encoded))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("cannot encode value for hashing: {0}")]
    Serialization(String),
}
