use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use prv_types::CreatorId;

use crate::entry::RegistryEntry;

/// How active a creator is, by number of registrations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityLevel {
    VeryActive,
    Active,
    Occasional,
    NewCreator,
}

impl ActivityLevel {
    pub fn from_count(count: usize) -> Self {
        match count {
            n if n > 10 => Self::VeryActive,
            n if n > 5 => Self::Active,
            n if n > 1 => Self::Occasional,
            _ => Self::NewCreator,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryActive => "Very Active",
            Self::Active => "Active",
            Self::Occasional => "Occasional",
            Self::NewCreator => "New Creator",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate of every registration made by one creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorStats {
    pub creator: CreatorId,
    pub count: usize,
    pub first_registration: i64,
    pub latest_registration: i64,
    pub activity: ActivityLevel,
    /// In the order the entries were given.
    pub registrations: Vec<RegistryEntry>,
}

impl CreatorStats {
    /// Group `entries` by creator.
    ///
    /// Ordered by count descending, then earliest first registration, then
    /// creator bytes.
    pub fn aggregate<'a>(entries: impl IntoIterator<Item = &'a RegistryEntry>) -> Vec<Self> {
        let mut groups: BTreeMap<CreatorId, Vec<RegistryEntry>> = BTreeMap::new();
        for entry in entries {
            groups
                .entry(entry.registration.creator)
                .or_default()
                .push(entry.clone());
        }

        let mut stats: Vec<Self> = groups
            .into_iter()
            .map(|(creator, registrations)| {
                let timestamps = registrations.iter().map(RegistryEntry::timestamp);
                let first_registration = timestamps.clone().min().unwrap_or_default();
                let latest_registration = timestamps.max().unwrap_or_default();
                Self {
                    creator,
                    count: registrations.len(),
                    first_registration,
                    latest_registration,
                    activity: ActivityLevel::from_count(registrations.len()),
                    registrations,
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.first_registration.cmp(&b.first_registration))
                .then(a.creator.cmp(&b.creator))
        });
        stats
    }
}
