//! Creator keys. A creator is identified by its Ed25519 public key, and a
//! transaction is authorized by that key's signature over the message bytes.

use std::fmt;

use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use prv_types::CreatorId;

pub const SIGNATURE_LEN: usize = 64;
const SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("secret key is not hex")]
    KeyEncoding,
    #[error("secret key must be {SECRET_LEN} bytes, got {actual}")]
    KeyLength { actual: usize },
    #[error("creator {0} is not an Ed25519 public key")]
    NotAPublicKey(String),
    #[error("signature does not match the message")]
    Mismatch,
}

/// Secret half of a creator identity.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Rebuild a key from its 32-byte secret.
    pub fn from_bytes(secret: [u8; SECRET_LEN]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(&secret),
        }
    }

    /// Accepts surrounding whitespace, as found in key files.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s.trim()).map_err(|_| SignatureError::KeyEncoding)?;
        let secret: [u8; SECRET_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::KeyLength {
                actual: bytes.len(),
            })?;
        Ok(Self::from_bytes(secret))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        self.inner.as_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub fn creator_id(&self) -> CreatorId {
        CreatorId::from_raw(self.inner.verifying_key().to_bytes())
    }

    /// Sign `message` with this key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.inner.sign(message).to_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("creator", &self.creator_id())
            .finish_non_exhaustive()
    }
}

/// Public half of a creator identity.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Fails for the 32-byte strings that are not curve points, which is
    /// every program-derived address.
    pub fn from_creator_id(creator: &CreatorId) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(creator.as_bytes())
            .map(|inner| Self { inner })
            .map_err(|_| SignatureError::NotAPublicKey(creator.abbreviated()))
    }

    pub fn to_creator_id(&self) -> CreatorId {
        CreatorId::from_raw(self.inner.to_bytes())
    }

    /// Check `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.inner
            .verify(message, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", self.to_creator_id().abbreviated())
    }
}

/// Detached Ed25519 signature. Serialized as 128 hex characters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; SIGNATURE_LEN];
        hex::decode_to_slice(&text, &mut bytes).map_err(de::Error::custom)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_binds_message_and_key() {
        let alice = SigningKey::generate();
        let bob = SigningKey::generate();
        let sig = alice.sign(b"register");

        assert!(alice.verifying_key().verify(b"register", &sig).is_ok());
        assert_eq!(
            alice.verifying_key().verify(b"registers", &sig),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            bob.verifying_key().verify(b"register", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn creator_id_is_the_public_key() {
        let key = SigningKey::generate();
        let creator = key.creator_id();
        let public = VerifyingKey::from_creator_id(&creator).unwrap();
        assert_eq!(public, key.verifying_key());
        assert_eq!(public.to_creator_id(), creator);
        assert_ne!(creator, SigningKey::generate().creator_id());
    }

    #[test]
    fn key_file_contents_parse() {
        let key = SigningKey::generate();
        let text = format!("  {}\n", hex::encode(key.as_bytes()));
        assert_eq!(SigningKey::from_hex(&text).unwrap().creator_id(), key.creator_id());

        assert_eq!(
            SigningKey::from_hex("zz").unwrap_err(),
            SignatureError::KeyEncoding
        );
        assert_eq!(
            SigningKey::from_hex("abcd").unwrap_err(),
            SignatureError::KeyLength { actual: 2 }
        );
    }

    #[test]
    fn signature_serializes_as_hex() {
        let sig = SigningKey::generate().sign(b"m");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json.len(), 2 + 2 * SIGNATURE_LEN);
        assert_eq!(serde_json::from_str::<Signature>(&json).unwrap(), sig);
        assert!(serde_json::from_str::<Signature>("\"abcd\"").is_err());
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let key = SigningKey::generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode(key.as_bytes())));
        assert!(debug.contains("creator"));
    }
}
