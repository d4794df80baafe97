use std::collections::{BTreeMap, HashSet};

use prv_types::Address;

use crate::addresses::{prompt_index_address, registration_address};
use crate::error::LedgerResult;
use crate::records::{AccountKind, PromptIndex, Registration};
use crate::traits::LedgerReader;

/// Result of a registry-wide integrity scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub registration_count: usize,
    pub index_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Account the violation was found in.
    pub address: Address,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    DanglingIndexEntry,
    NotARegistration,
    PromptMismatch,
    DuplicateEntry,
    UnindexedRegistration,
    MisplacedRegistration,
    MisplacedIndex,
}

/// Cross-checks registrations against prompt indexes.
pub struct RegistryValidator {
    program: Address,
}

impl RegistryValidator {
    pub fn new(program: Address) -> Self {
        Self { program }
    }

    /// Scan every account visible through `reader`.
    pub fn validate<R: LedgerReader + ?Sized>(&self, reader: &R) -> LedgerResult<ValidationReport> {
        let registrations: BTreeMap<Address, Registration> = reader
            .fetch_all(AccountKind::Registration)?
            .into_iter()
            .filter_map(|(a, acc)| acc.into_registration().map(|r| (a, r)))
            .collect();
        let indexes: BTreeMap<Address, PromptIndex> = reader
            .fetch_all(AccountKind::PromptIndex)?
            .into_iter()
            .filter_map(|(a, acc)| acc.into_prompt_index().map(|i| (a, i)))
            .collect();

        let mut violations = Vec::new();

        for (address, index) in &indexes {
            let expected = prompt_index_address(&self.program, &index.prompt_hash)?;
            if *address != expected {
                violations.push(Violation {
                    address: *address,
                    kind: ViolationKind::MisplacedIndex,
                    description: format!("index for {} belongs at {expected}", index.prompt_hash),
                });
            }
            self.check_entries(*address, index, &registrations, &indexes, &mut violations);
        }

        for (address, registration) in &registrations {
            let expected =
                registration_address(&self.program, &registration.creator, &registration.prompt_hash)?;
            if *address != expected {
                violations.push(Violation {
                    address: *address,
                    kind: ViolationKind::MisplacedRegistration,
                    description: format!("registration belongs at {expected}"),
                });
            }

            let idx_addr = prompt_index_address(&self.program, &registration.prompt_hash)?;
            let indexed = indexes
                .get(&idx_addr)
                .is_some_and(|index| index.contains(address));
            if !indexed {
                violations.push(Violation {
                    address: *address,
                    kind: ViolationKind::UnindexedRegistration,
                    description: format!("missing from prompt index {idx_addr}"),
                });
            }
        }

        Ok(ValidationReport {
            registration_count: registrations.len(),
            index_count: indexes.len(),
            violations,
        })
    }

    fn check_entries(
        &self,
        idx_addr: Address,
        index: &PromptIndex,
        registrations: &BTreeMap<Address, Registration>,
        indexes: &BTreeMap<Address, PromptIndex>,
        violations: &mut Vec<Violation>,
    ) {
        let mut seen = HashSet::new();
        for entry in index.registrations() {
            if !seen.insert(*entry) {
                violations.push(Violation {
                    address: idx_addr,
                    kind: ViolationKind::DuplicateEntry,
                    description: format!("{entry} listed more than once"),
                });
                continue;
            }
            match registrations.get(entry) {
                Some(r) if r.prompt_hash != index.prompt_hash => violations.push(Violation {
                    address: idx_addr,
                    kind: ViolationKind::PromptMismatch,
                    description: format!("{entry} registers prompt {}", r.prompt_hash),
                }),
                Some(_) => {}
                None if indexes.contains_key(entry) => violations.push(Violation {
                    address: idx_addr,
                    kind: ViolationKind::NotARegistration,
                    description: format!("{entry} is a prompt index"),
                }),
                None => violations.push(Violation {
                    address: idx_addr,
                    kind: ViolationKind::DanglingIndexEntry,
                    description: format!("{entry} does not exist"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::REGISTRY_PROGRAM;
    use crate::error::LedgerError;
    use crate::records::Account;
    use crate::transaction::{TransactionId, TransactionReceipt};
    use prv_types::{CreatorId, Fingerprint};

    /// A reader over hand-built (possibly corrupt) account state.
    #[derive(Default)]
    struct FixtureReader(BTreeMap<Address, Account>);

    impl FixtureReader {
        fn put(&mut self, address: Address, account: Account) {
            self.0.insert(address, account);
        }

        /// Insert a correctly placed registration and return its address.
        fn register(&mut self, creator: u8, prompt: &str) -> Address {
            let creator = CreatorId::from_raw([creator; 32]);
            let prompt_hash = Fingerprint::of_text(prompt);
            let address = registration_address(&REGISTRY_PROGRAM, &creator, &prompt_hash).unwrap();
            self.put(
                address,
                Account::Registration(Registration {
                    prompt_hash,
                    output_hash: Fingerprint::of_text("out"),
                    creator,
                    timestamp: 1,
                }),
            );
            address
        }

        fn index(&mut self, prompt: &str, entries: Vec<Address>) -> Address {
            let prompt_hash = Fingerprint::of_text(prompt);
            let address = prompt_index_address(&REGISTRY_PROGRAM, &prompt_hash).unwrap();
            self.put(
                address,
                Account::PromptIndex(PromptIndex::from_entries(prompt_hash, entries)),
            );
            address
        }
    }

    impl LedgerReader for FixtureReader {
        fn fetch_account(&self, address: &Address) -> Result<Option<Account>, LedgerError> {
            Ok(self.0.get(address).cloned())
        }

        fn fetch_all(&self, kind: AccountKind) -> Result<Vec<(Address, Account)>, LedgerError> {
            Ok(self
                .0
                .iter()
                .filter(|(_, a)| a.kind() == kind)
                .map(|(addr, a)| (*addr, a.clone()))
                .collect())
        }

        fn transaction(&self, _: &TransactionId) -> Result<Option<TransactionReceipt>, LedgerError> {
            Ok(None)
        }
    }

    fn validate(reader: &FixtureReader) -> ValidationReport {
        RegistryValidator::new(REGISTRY_PROGRAM)
            .validate(reader)
            .unwrap()
    }

    fn kinds(report: &ValidationReport) -> Vec<ViolationKind> {
        report.violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn consistent_registry_is_valid() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        let b = reader.register(2, "p");
        let c = reader.register(1, "q");
        reader.index("p", vec![a, b]);
        reader.index("q", vec![c]);

        let report = validate(&reader);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.registration_count, 3);
        assert_eq!(report.index_count, 2);
    }

    #[test]
    fn empty_registry_is_valid() {
        let report = validate(&FixtureReader::default());
        assert!(report.is_valid());
        assert_eq!(report.registration_count, 0);
    }

    #[test]
    fn detects_unindexed_registration() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        reader.register(2, "p");
        reader.index("p", vec![a]);

        assert_eq!(kinds(&validate(&reader)), vec![ViolationKind::UnindexedRegistration]);
    }

    #[test]
    fn detects_dangling_and_duplicate_entries() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        reader.index("p", vec![a, a, Address::from_raw([7; 32])]);

        assert_eq!(
            kinds(&validate(&reader)),
            vec![ViolationKind::DuplicateEntry, ViolationKind::DanglingIndexEntry]
        );
    }

    #[test]
    fn detects_entry_pointing_at_index() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        let q_idx = reader.index("q", vec![]);
        reader.index("p", vec![a, q_idx]);

        assert_eq!(kinds(&validate(&reader)), vec![ViolationKind::NotARegistration]);
    }

    #[test]
    fn detects_prompt_mismatch() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        let b = reader.register(1, "q");
        reader.index("p", vec![a, b]);

        let report = validate(&reader);
        // `b` is listed under the wrong prompt and absent from its own index.
        assert_eq!(
            kinds(&report),
            vec![ViolationKind::PromptMismatch, ViolationKind::UnindexedRegistration]
        );
    }

    #[test]
    fn detects_misplaced_registration() {
        let mut reader = FixtureReader::default();
        let wrong = Address::from_raw([5; 32]);
        reader.put(
            wrong,
            Account::Registration(Registration {
                prompt_hash: Fingerprint::of_text("p"),
                output_hash: Fingerprint::of_text("o"),
                creator: CreatorId::from_raw([1; 32]),
                timestamp: 1,
            }),
        );
        reader.index("p", vec![wrong]);

        assert_eq!(kinds(&validate(&reader)), vec![ViolationKind::MisplacedRegistration]);
    }

    #[test]
    fn detects_misplaced_index() {
        let mut reader = FixtureReader::default();
        let a = reader.register(1, "p");
        let wrong = Address::from_raw([6; 32]);
        reader.put(
            wrong,
            Account::PromptIndex(PromptIndex::from_entries(Fingerprint::of_text("p"), vec![a])),
        );

        let report = validate(&reader);
        // The registration's real index address is empty, so it is unindexed too.
        assert_eq!(
            kinds(&report),
            vec![ViolationKind::MisplacedIndex, ViolationKind::UnindexedRegistration]
        );
        assert_eq!(report.violations[0].address, wrong);
    }
}
