//! Foundation types for the provenance registry.
//!
//! Every other registry crate depends on `prv-types`. The types here are
//! plain 32-byte values with strict parsing, hex display, and serde support.
//!
//! # Key Types
//!
//! - [`Fingerprint`]: SHA-256 digest of prompt or output text
//! - [`Address`]: location of an account in the ledger's address space
//! - [`CreatorId`]: public identity of a registering creator

pub mod address;
pub mod error;
pub mod fingerprint;
pub mod identity;

pub use address::Address;
pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use identity::CreatorId;

/// Length in bytes of every fixed-size value in this crate.
pub const HASH_LEN: usize = 32;

pub(crate) fn parse_hex32(s: &str) -> Result<[u8; 32], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    to_array(&bytes)
}

pub(crate) fn to_array(bytes: &[u8]) -> Result<[u8; 32], TypeError> {
    bytes.try_into().map_err(|_| TypeError::InvalidLength {
        expected: HASH_LEN,
        actual: bytes.len(),
    })
}
