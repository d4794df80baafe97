//! Program-derived account addresses.
//!
//! A derived address is a deterministic function of a program address, a
//! namespace tag, and a list of byte-string parts. Candidates are generated
//! with a descending bump seed and the first candidate that is *not* a valid
//! Ed25519 point is chosen, so no private key can ever exist for it and no
//! ordinary identity can collide with it.

use prv_types::Address;

const DOMAIN: &[u8] = b"prv-pda-v1";

/// A derived address together with the bump seed that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Address,
    pub bump: u8,
}

/// Errors from address derivation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("no off-curve address exists for the given seeds")]
    Exhausted,
}

/// Derive the account address for `(tag, parts)` under `program`.
pub fn derive_address(
    program: &Address,
    tag: &[u8],
    parts: &[&[u8]],
) -> Result<DerivedAddress, DerivationError> {
    for bump in (0..=u8::MAX).rev() {
        let candidate = candidate(program, tag, parts, bump);
        if !is_on_curve(&candidate) {
            return Ok(DerivedAddress {
                address: Address::from_raw(candidate),
                bump,
            });
        }
    }
    Err(DerivationError::Exhausted)
}

/// Returns `true` if `bytes` decode to a valid Ed25519 public key.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    ed25519_dalek::VerifyingKey::from_bytes(bytes).is_ok()
}

fn candidate(program: &Address, tag: &[u8], parts: &[&[u8]], bump: u8) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN);
    // Length prefixes keep (tag, parts) tuples injective.
    hasher.update(&(tag.len() as u32).to_le_bytes());
    hasher.update(tag);
    hasher.update(&(parts.len() as u32).to_le_bytes());
    for part in parts {
        hasher.update(&(part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    hasher.update(&[bump]);
    hasher.update(program.as_bytes());
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;
    use proptest::prelude::*;

    const PROGRAM: Address = Address::from_raw([42u8; 32]);

    #[test]
    fn derive_is_deterministic() {
        let a = derive_address(&PROGRAM, b"registration", &[&[1; 32], &[2; 32]]).unwrap();
        let b = derive_address(&PROGRAM, b"registration", &[&[1; 32], &[2; 32]]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tag_separates_namespaces() {
        let a = derive_address(&PROGRAM, b"registration", &[&[1; 32]]).unwrap();
        let b = derive_address(&PROGRAM, b"prompt_index", &[&[1; 32]]).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn program_separates_address_spaces() {
        let other = Address::from_raw([7u8; 32]);
        let a = derive_address(&PROGRAM, b"prompt_index", &[&[1; 32]]).unwrap();
        let b = derive_address(&other, b"prompt_index", &[&[1; 32]]).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn part_boundaries_matter() {
        let a = derive_address(&PROGRAM, b"t", &[b"ab", b"c"]).unwrap();
        let b = derive_address(&PROGRAM, b"t", &[b"a", b"bc"]).unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn derived_address_is_off_curve() {
        let derived = derive_address(&PROGRAM, b"registration", &[&[3; 32]]).unwrap();
        assert!(!is_on_curve(derived.address.as_bytes()));
    }

    #[test]
    fn real_public_keys_are_on_curve() {
        let key = SigningKey::generate().verifying_key();
        assert!(is_on_curve(key.to_creator_id().as_bytes()));
    }

    #[test]
    fn bump_reproduces_address() {
        let parts: [&[u8]; 1] = [&[5; 32]];
        let derived = derive_address(&PROGRAM, b"prompt_index", &parts).unwrap();
        let again = candidate(&PROGRAM, b"prompt_index", &parts, derived.bump);
        assert_eq!(derived.address.as_bytes(), &again);
    }

    proptest! {
        #[test]
        fn distinct_creators_get_distinct_addresses(
            c1 in proptest::array::uniform32(any::<u8>()),
            c2 in proptest::array::uniform32(any::<u8>()),
            prompt in proptest::array::uniform32(any::<u8>()),
        ) {
            prop_assume!(c1 != c2);
            let a = derive_address(&PROGRAM, b"registration", &[&c1, &prompt]).unwrap();
            let b = derive_address(&PROGRAM, b"registration", &[&c2, &prompt]).unwrap();
            prop_assert_ne!(a.address, b.address);
        }
    }
}
