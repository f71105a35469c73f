//! Contract ABI generations.
//!
//! Each deployed framework release is a `ContractVersion` tag with the set of
//! controller addresses that run it. A registry lookup happens once per address
//! and the resulting tag travels with every read call that depends on the ABI.
//! Addresses not listed resolve to the default version.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Release tag of a contract generation (e.g. `0.0.1-rc.32`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractVersion(pub String);

impl ContractVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn tag(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One generation and the addresses deployed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub tag: String,
    #[serde(default)]
    pub addresses: BTreeSet<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRegistry {
    by_address: BTreeMap<Address, ContractVersion>,
    default_version: ContractVersion,
}

impl VersionRegistry {
    /// Registry with no listed addresses.
    pub fn with_default(default_version: ContractVersion) -> Self {
        Self {
            by_address: BTreeMap::new(),
            default_version,
        }
    }

    /// Build from configured entries. An address listed under two generations
    /// keeps the later entry.
    pub fn from_entries(default_version: ContractVersion, entries: &[VersionEntry]) -> Self {
        let mut registry = Self::with_default(default_version);
        for entry in entries {
            for address in &entry.addresses {
                if let Some(previous) = registry
                    .by_address
                    .insert(*address, ContractVersion::new(entry.tag.clone()))
                {
                    tracing::warn!(
                        address = %address,
                        previous = %previous,
                        tag = %entry.tag,
                        "address listed under more than one contract version"
                    );
                }
            }
        }
        registry
    }

    pub fn register(&mut self, address: Address, version: ContractVersion) {
        self.by_address.insert(address, version);
    }

    pub fn lookup(&self, address: &Address) -> &ContractVersion {
        self.by_address
            .get(address)
            .unwrap_or(&self.default_version)
    }

    pub fn default_version(&self) -> &ContractVersion {
        &self.default_version
    }

    /// Distinct tags known to the registry, default included.
    pub fn versions(&self) -> BTreeSet<&ContractVersion> {
        let mut tags: BTreeSet<_> = self.by_address.values().collect();
        tags.insert(&self.default_version);
        tags
    }
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::with_default(ContractVersion::new(DEFAULT_VERSION_TAG))
    }
}

/// Tag assumed when no configuration names one.
pub const DEFAULT_VERSION_TAG: &str = "0.0.1-rc.32";
