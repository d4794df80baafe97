use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Public identity of a creator.
///
/// A `CreatorId` is the raw 32-byte Ed25519 public key of the identity that
/// authorizes a registration. The registry never inspects it beyond
/// equality, ordering, and use as derivation input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatorId([u8; 32]);

impl CreatorId {
    /// Create from raw public key bytes.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form used in listings: first and last 8 hex characters.
    pub fn abbreviated(&self) -> String {
        let hex = self.to_hex();
        format!("{}...{}", &hex[..8], &hex[hex.len() - 8..])
    }

    /// Parse from a hex string, with or without a `cr:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("cr:").unwrap_or(s);
        crate::parse_hex32(s).map(Self)
    }
}

impl fmt::Debug for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreatorId(cr:{})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
