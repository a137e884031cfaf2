//! Exclusive per-network lock, so two runs never write the same book.

use std::fs::{File, OpenOptions};

use anyhow::{Context, Result};
use ectss_deploy::FsAddressStore;
use fs2::FileExt;

const LOCK_FILENAME: &str = ".lock";

/// Held for the duration of a run. The lock is released when the file closes.
#[derive(Debug)]
pub struct NetworkLock {
    _file: File,
}

impl NetworkLock {
    pub fn acquire(store: &FsAddressStore, network: &str) -> Result<Self> {
        let dir = store.network_dir(network)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(LOCK_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Network `{network}` is in use by another process (lock: {})",
                path.display()
            )
        })?;

        tracing::debug!(network, path = %path.display(), "Network lock acquired");
        Ok(Self { _file: file })
    }
}
