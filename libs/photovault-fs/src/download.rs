//! Download coordinator

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use photovault_domain::{Result, VaultError};
use tokio::fs::File;
use tracing::{debug, instrument};

use crate::address::{OriginalLocation, StorageAddress};
use crate::cache::ImageCache;

/// Serves the variants of one stored image
pub struct DownloadCoordinator {
    address: StorageAddress,
    cache: Arc<ImageCache>,
}

impl DownloadCoordinator {
    pub fn new(address: StorageAddress, cache: Arc<ImageCache>) -> Self {
        Self { address, cache }
    }

    pub fn address(&self) -> &StorageAddress {
        &self.address
    }

    /// Open the original for streaming
    ///
    /// # Errors
    ///
    /// Returns `VaultError::RemoteUnsupported` for remote originals and
    /// `VaultError::NotFound` when the file is gone.
    #[instrument(skip(self), fields(uri = %self.address))]
    pub async fn open_original(&self) -> Result<File> {
        match self.address.original() {
            OriginalLocation::File(path) => open(&path).await,
            OriginalLocation::Remote(uri) => Err(VaultError::RemoteUnsupported(format!(
                "cannot read original at {}",
                uri
            ))),
        }
    }

    /// Compressed rendition, from the cache when possible
    ///
    /// A miss reads the file and puts the bytes back into the cache.
    #[instrument(skip(self), fields(uri = %self.address))]
    pub async fn compressed(&self) -> Result<Bytes> {
        let key = self.address.to_string();
        if let Some(bytes) = self.cache.get(&key) {
            debug!("Compressed rendition served from cache");
            return Ok(bytes);
        }

        let path = self.address.compressed_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VaultError::NotFound(format!("compressed image {}", key)))
            }
            Err(e) => return Err(VaultError::io(format!("read {}", path.display()), e)),
        };

        debug!(size = bytes.len(), "Cache miss, compressed rendition read from disk");
        self.cache.set(&key, bytes.clone(), bytes.len() as u64);
        Ok(bytes)
    }
}

async fn open(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            VaultError::NotFound(format!("original image {}", path.display()))
        } else {
            VaultError::io(format!("open {}", path.display()), e)
        }
    })
}
