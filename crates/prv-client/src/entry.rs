use serde::{Deserialize, Serialize};

use prv_ledger::Registration;
use prv_types::Address;

/// A registration together with the account it was read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub address: Address,
    pub registration: Registration,
}

impl RegistryEntry {
    pub fn new(address: Address, registration: Registration) -> Self {
        Self {
            address,
            registration,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.registration.timestamp
    }
}
