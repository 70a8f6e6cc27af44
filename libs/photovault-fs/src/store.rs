//! Local filesystem image store
//!
//! Binds a files root and the process-wide `ImageCache`, and hands out one
//! coordinator per operation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use photovault_domain::{ImageStore, Result, UploadItem};
use tracing::{info, instrument};

use crate::address::StorageAddress;
use crate::cache::ImageCache;
use crate::delete::DeleteCoordinator;
use crate::download::DownloadCoordinator;
use crate::upload::UploadCoordinator;

/// `ImageStore` over a local files root
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use photovault_fs::{CacheConfig, ImageCache, LocalImageStore};
///
/// let cache = Arc::new(ImageCache::new(CacheConfig::default()));
/// let store = LocalImageStore::new("/var/lib/photos/files", cache);
/// ```
#[derive(Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    cache: Arc<ImageCache>,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, cache: Arc<ImageCache>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "Initializing LocalImageStore");
        Self { root, cache }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    pub fn address(&self, uri: &str) -> Result<StorageAddress> {
        StorageAddress::parse(&self.root, uri)
    }

    pub fn uploader(&self, item: UploadItem) -> UploadCoordinator {
        UploadCoordinator::new(&self.root, self.cache.clone(), item)
    }

    pub fn downloader(&self, uri: &str) -> Result<DownloadCoordinator> {
        Ok(DownloadCoordinator::new(self.address(uri)?, self.cache.clone()))
    }

    pub fn deleter(&self, uri: &str) -> Result<DeleteCoordinator> {
        Ok(DeleteCoordinator::new(self.address(uri)?, self.cache.clone()))
    }

    /// Release the cache at shutdown
    pub fn close(&self) {
        self.cache.close();
    }
}

impl ImageStore for LocalImageStore {
    type Upload = UploadCoordinator;

    fn begin_upload(&self, item: UploadItem) -> UploadCoordinator {
        self.uploader(item)
    }

    #[instrument(skip(self))]
    fn discard(&self, uri: &str) -> impl Future<Output = Result<()>> + Send {
        let deleter = self.deleter(uri);
        async move { deleter?.purge().await }
    }

    #[instrument(skip(self))]
    fn delete(&self, uri: &str) -> impl Future<Output = Result<()>> + Send {
        let deleter = self.deleter(uri);
        async move { deleter?.delete().await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::testing::jpeg_fixture;
    use photovault_domain::{CorrelationId, PendingUpload, VaultError};
    use photovault_domain::ingestion::WriteJournal;

    #[tokio::test]
    async fn test_upload_serve_delete() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(root.path(), Arc::default());
        let item = UploadItem::new(
            CorrelationId::new(1),
            Box::new(MemorySource::new("a.jpg", jpeg_fixture(40, 30, 1))),
        );

        let mut upload = store.begin_upload(item);
        upload.content_hash().await.unwrap();
        let photo = upload.finish(WriteJournal::new()).await.unwrap();

        let preview = store.downloader(&photo.uri).unwrap().compressed().await.unwrap();
        assert!(!preview.is_empty());

        store.delete(&photo.uri).await.unwrap();
        assert!(matches!(
            store.delete(&photo.uri).await.unwrap_err(),
            VaultError::NotFound(_)
        ));
        store.discard(&photo.uri).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_uri_is_rejected() {
        let store = LocalImageStore::new("/srv/files", Arc::default());
        assert!(matches!(
            store.downloader("http://elsewhere/a").err(),
            Some(VaultError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_close_closes_cache() {
        let store = LocalImageStore::new("/srv/files", Arc::default());
        store.close();
        assert!(store.cache().is_closed());
    }
}
