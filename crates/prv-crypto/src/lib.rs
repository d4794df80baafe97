//! Cryptographic primitives for the provenance registry.
//!
//! Provides domain-separated BLAKE3 hashing, program-derived account
//! addresses, and Ed25519 signing/verification for creator identities.

pub mod derive;
pub mod hasher;
pub mod keys;

pub use derive::{derive_address, is_on_curve, DerivationError, DerivedAddress};
pub use hasher::{ContentHasher, HasherError};
pub use keys::{Signature, SignatureError, SigningKey, VerifyingKey, SIGNATURE_LEN};
