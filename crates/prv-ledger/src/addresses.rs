//! Account addresses of the registry program.

use prv_crypto::derive_address;
use prv_types::{Address, CreatorId, Fingerprint};

use crate::error::LedgerResult;

/// Address of the registry program. Every registry account is derived under it.
pub const REGISTRY_PROGRAM: Address = Address::from_raw([
    0x86, 0x1f, 0x3a, 0x52, 0xc4, 0x0e, 0x9b, 0x77, 0x21, 0xd8, 0x4c, 0x05, 0xaa, 0x63, 0xf0,
    0x1b, 0x5e, 0x92, 0x37, 0xcd, 0x48, 0x0a, 0xe6, 0x71, 0x9f, 0x2c, 0xb3, 0x14, 0x6d, 0x88,
    0x03, 0x5a,
]);

/// Namespace tag of `Registration` accounts.
pub const REGISTRATION_TAG: &[u8] = b"registration";

/// Namespace tag of `PromptIndex` accounts.
pub const PROMPT_INDEX_TAG: &[u8] = b"prompt_index";

/// `derive("registration", creator, prompt_hash)`.
pub fn registration_address(
    program: &Address,
    creator: &CreatorId,
    prompt_hash: &Fingerprint,
) -> LedgerResult<Address> {
    let derived = derive_address(
        program,
        REGISTRATION_TAG,
        &[creator.as_bytes(), prompt_hash.as_bytes()],
    )?;
    Ok(derived.address)
}

/// `derive("prompt_index", prompt_hash)`. Independent of the creator.
pub fn prompt_index_address(program: &Address, prompt_hash: &Fingerprint) -> LedgerResult<Address> {
    let derived = derive_address(program, PROMPT_INDEX_TAG, &[prompt_hash.as_bytes()])?;
    Ok(derived.address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_address_depends_on_creator_and_prompt() {
        let p1 = Fingerprint::of_text("prompt one");
        let p2 = Fingerprint::of_text("prompt two");
        let c1 = CreatorId::from_raw([1; 32]);
        let c2 = CreatorId::from_raw([2; 32]);

        let a = registration_address(&REGISTRY_PROGRAM, &c1, &p1).unwrap();
        assert_eq!(a, registration_address(&REGISTRY_PROGRAM, &c1, &p1).unwrap());
        assert_ne!(a, registration_address(&REGISTRY_PROGRAM, &c2, &p1).unwrap());
        assert_ne!(a, registration_address(&REGISTRY_PROGRAM, &c1, &p2).unwrap());
    }

    #[test]
    fn prompt_index_address_ignores_creator() {
        let prompt = Fingerprint::of_text("shared prompt");
        let idx = prompt_index_address(&REGISTRY_PROGRAM, &prompt).unwrap();
        let reg = registration_address(&REGISTRY_PROGRAM, &CreatorId::from_raw([1; 32]), &prompt)
            .unwrap();
        assert_ne!(idx, reg);
        assert_eq!(idx, prompt_index_address(&REGISTRY_PROGRAM, &prompt).unwrap());
    }
}
