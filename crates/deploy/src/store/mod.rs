//! Per-network persistence of deployed artifact addresses.

mod fs;
mod memory;

pub use fs::{ADDRESS_BOOK_FILENAME, FsAddressStore};
pub use memory::InMemoryAddressStore;

use std::collections::BTreeMap;

use derive_more::Deref;

use crate::{chain::DeployedArtifact, error::StoreError};

/// Read/write access to address books, one book per network identity.
///
/// Implementations provide no locking: callers serialize deployment runs
/// targeting the same network.
pub trait AddressStore: Send + Sync {
    /// Replace the whole book for `book.network()`.
    fn write(&self, book: &NetworkAddressBook) -> Result<(), StoreError>;

    /// Read the book for `network`.
    ///
    /// Fails with [`StoreError::NotFound`] if nothing was ever written, and with
    /// [`StoreError::CorruptData`] if the stored representation does not parse.
    fn read(&self, network: &str) -> Result<NetworkAddressBook, StoreError>;
}

/// Mapping from artifact name to deployed address for exactly one network.
///
/// A `None` value is a reserved entry: an optional artifact that is known but
/// has not been deployed.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct NetworkAddressBook {
    network: String,
    #[deref]
    entries: BTreeMap<String, Option<String>>,
}

impl NetworkAddressBook {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Record a deployment, overwriting any previous address for the artifact.
    pub fn record(&mut self, deployed: DeployedArtifact) {
        debug_assert_eq!(deployed.network, self.network);
        self.entries.insert(deployed.name, Some(deployed.address));
    }

    /// Insert a null entry for `name` unless an address is already present.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.entries.entry(name.into()).or_insert(None);
    }

    /// Address of a deployed artifact. Reserved and unknown entries yield `None`.
    pub fn address(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|address| address.as_deref())
    }

    /// Deployed entries only, in name order.
    pub fn deployed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, address)| Some((name.as_str(), address.as_deref()?)))
    }

    /// Serialize to the on-disk representation: a flat JSON object.
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(&self.entries).map_err(|e| StoreError::CorruptData {
            network: self.network.clone(),
            reason: e.to_string(),
        })
    }

    /// Parse the on-disk representation for `network`.
    pub fn from_json(network: &str, content: &str) -> Result<Self, StoreError> {
        let entries: BTreeMap<String, Option<String>> =
            serde_json::from_str(content).map_err(|e| StoreError::CorruptData {
                network: network.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            network: network.to_string(),
            entries,
        })
    }
}

/// Network identifiers double as directory names.
pub(crate) fn validate_network(network: &str) -> Result<(), StoreError> {
    let valid = !network.is_empty()
        && network
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidNetwork(network.to_string()))
    }
}
