//! Delete coordinator

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use photovault_domain::{Result, VaultError};
use tracing::{debug, info, instrument};

use crate::address::StorageAddress;
use crate::cache::ImageCache;

/// Removes the stored variants of one image
///
/// The original is only removed for local addresses; a remote original is
/// not owned by this store.
pub struct DeleteCoordinator {
    address: StorageAddress,
    cache: Arc<ImageCache>,
}

impl DeleteCoordinator {
    pub fn new(address: StorageAddress, cache: Arc<ImageCache>) -> Self {
        Self { address, cache }
    }

    /// Delete a committed image; a missing file is an error
    #[instrument(skip(self), fields(uri = %self.address))]
    pub async fn delete(&self) -> Result<()> {
        self.remove_all(false).await?;
        info!("Stored image deleted");
        Ok(())
    }

    /// Remove whatever an interrupted upload left behind
    #[instrument(skip(self), fields(uri = %self.address))]
    pub async fn purge(&self) -> Result<()> {
        self.remove_all(true).await?;
        debug!("Partial upload purged");
        Ok(())
    }

    async fn remove_all(&self, missing_ok: bool) -> Result<()> {
        self.cache.remove(&self.address.to_string());
        remove(&self.address.compressed_path(), missing_ok).await?;
        if let Some(original) = self.address.original_path() {
            remove(&original, missing_ok).await?;
        }
        Ok(())
    }
}

async fn remove(path: &Path, missing_ok: bool) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound && missing_ok => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(VaultError::NotFound(format!("file {}", path.display())))
        }
        Err(e) => Err(VaultError::io(format!("remove {}", path.display()), e)),
    }
}
