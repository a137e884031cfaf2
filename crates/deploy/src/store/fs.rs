//! File-backed address store.

use std::{
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::error::StoreError;

use super::{AddressStore, NetworkAddressBook, validate_network};

/// The file holding one network's address book.
pub const ADDRESS_BOOK_FILENAME: &str = "addresses.json";

/// Stores each book at `<root>/<network>/addresses.json`.
#[derive(Debug, Clone)]
pub struct FsAddressStore {
    root: PathBuf,
}

impl FsAddressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory scoped to `network`. Not created by this call.
    pub fn network_dir(&self, network: &str) -> Result<PathBuf, StoreError> {
        validate_network(network)?;
        Ok(self.root.join(network))
    }

    pub fn book_path(&self, network: &str) -> Result<PathBuf, StoreError> {
        Ok(self.network_dir(network)?.join(ADDRESS_BOOK_FILENAME))
    }
}

impl AddressStore for FsAddressStore {
    fn write(&self, book: &NetworkAddressBook) -> Result<(), StoreError> {
        let network = book.network();
        let dir = self.network_dir(network)?;
        let io_err = |source| StoreError::Io {
            network: network.to_string(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let content = book.to_json()?;

        let path = dir.join(ADDRESS_BOOK_FILENAME);
        let tmp_path = dir.join(format!(".{ADDRESS_BOOK_FILENAME}.tmp"));
        if let Err(e) = replace_file(&tmp_path, &path, content.as_bytes()) {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path)
                && cleanup.kind() != ErrorKind::NotFound
            {
                tracing::warn!(
                    network,
                    path = %tmp_path.display(),
                    error = %cleanup,
                    "Failed to remove temporary address book"
                );
            }
            return Err(io_err(e));
        }

        tracing::debug!(
            network,
            path = %path.display(),
            entries = book.len(),
            "Address book written"
        );

        Ok(())
    }

    fn read(&self, network: &str) -> Result<NetworkAddressBook, StoreError> {
        let path = self.book_path(network)?;

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    network: network.to_string(),
                    location: path,
                });
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::CorruptData {
                    network: network.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    network: network.to_string(),
                    source,
                });
            }
        };

        let book = NetworkAddressBook::from_json(network, &content)?;
        tracing::debug!(network, path = %path.display(), entries = book.len(), "Address book loaded");
        Ok(book)
    }
}

/// Temp + fsync + rename, so readers see either the old or the new file.
fn replace_file(tmp_path: &Path, path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = std::fs::File::create(tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp_path, path)
}
