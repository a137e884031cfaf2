//! In-memory address store.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use crate::error::StoreError;

use super::{AddressStore, NetworkAddressBook, validate_network};

/// Keeps serialized books in memory, going through the same JSON
/// representation as the file store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryAddressStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    books: HashMap<String, String>,
    writes: HashMap<String, usize>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw content for `network`, bypassing serialization.
    pub fn insert_raw(&self, network: impl Into<String>, content: impl Into<String>) {
        self.lock().books.insert(network.into(), content.into());
    }

    /// Number of successful writes for `network`.
    pub fn write_count(&self, network: &str) -> usize {
        self.lock().writes.get(network).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Books are replaced as whole strings, so a poisoned lock still holds whole books.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AddressStore for InMemoryAddressStore {
    fn write(&self, book: &NetworkAddressBook) -> Result<(), StoreError> {
        validate_network(book.network())?;
        let content = book.to_json()?;

        let mut inner = self.lock();
        inner.books.insert(book.network().to_string(), content);
        *inner.writes.entry(book.network().to_string()).or_default() += 1;
        Ok(())
    }

    fn read(&self, network: &str) -> Result<NetworkAddressBook, StoreError> {
        validate_network(network)?;

        let inner = self.lock();
        let content = inner.books.get(network).ok_or_else(|| StoreError::NotFound {
            network: network.to_string(),
            location: PathBuf::from(format!("memory://{network}")),
        })?;
        NetworkAddressBook::from_json(network, content)
    }
}
