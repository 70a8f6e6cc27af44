//! Upload coordinator
//!
//! Runs the per-item upload sequence against the local files root:
//!
//! 1. read the source and hash it
//! 2. annotate the description with the display name
//! 3. decode format and dimensions
//! 4. allocate a fresh storage address and create its directory
//! 5. write the original (local addresses only)
//! 6. compress, write the compressed variant and cache it
//! 7. return the candidate record
//!
//! Steps 1 and 2-7 are split across `PendingUpload::content_hash` and
//! `PendingUpload::finish` so the batch dedup gates can run in between.

use std::fs::File;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use photovault_domain::ingestion::{annotate_description, WriteGuard, WriteJournal};
use photovault_domain::{
    ContentHash, CorrelationId, NewPhoto, PendingUpload, UploadError, UploadItem, UploadStep,
    VaultError,
};
use tracing::{debug, info, instrument};

use crate::address::StorageAddress;
use crate::cache::ImageCache;
use crate::processor::ImageProcessor;

type StepResult<T> = std::result::Result<T, UploadError>;

pub struct UploadCoordinator {
    root: PathBuf,
    cache: Arc<ImageCache>,
    correlation_id: CorrelationId,
    name: String,
    description: String,
    captured_at: Option<DateTime<Utc>>,
    processor: Option<ImageProcessor>,
}

impl UploadCoordinator {
    pub fn new(root: impl Into<PathBuf>, cache: Arc<ImageCache>, item: UploadItem) -> Self {
        let name = item.display_name().to_string();
        Self {
            root: root.into(),
            cache,
            correlation_id: item.correlation_id,
            name,
            description: item.description,
            captured_at: item.captured_at,
            processor: Some(ImageProcessor::new(item.source)),
        }
    }

    /// Run the whole sequence outside of a batch
    pub async fn upload(mut self) -> StepResult<NewPhoto> {
        self.content_hash().await?;
        self.finish(WriteJournal::new()).await
    }

    /// Run a processor operation on the blocking pool
    async fn with_processor<T, F>(&mut self, step: UploadStep, f: F) -> StepResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImageProcessor) -> photovault_domain::Result<T> + Send + 'static,
    {
        let mut processor = self.processor.take().ok_or_else(|| {
            UploadError::new(step, VaultError::internal("image processor unavailable"))
        })?;

        let (processor, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut processor);
            (processor, result)
        })
        .await
        .map_err(|e| UploadError::new(step, VaultError::internal(format!("processing task failed: {}", e))))?;

        self.processor = Some(processor);
        result.map_err(|e| UploadError::new(step, e))
    }
}

impl PendingUpload for UploadCoordinator {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn content_hash(&mut self) -> impl Future<Output = StepResult<ContentHash>> + Send {
        async move {
            self.with_processor(UploadStep::Read, |p| p.content_hash())
                .await
        }
    }

    #[instrument(skip(self, journal), fields(correlation_id = %self.correlation_id, name = %self.name))]
    fn finish(mut self, journal: WriteJournal) -> impl Future<Output = StepResult<NewPhoto>> + Send {
        async move {
            self.content_hash().await?;
            let description = annotate_description(&self.description, &self.name);

            let (metadata, data) = self
                .with_processor(UploadStep::Decode, |p| Ok((p.metadata()?, p.data()?)))
                .await?;

            let address = StorageAddress::create(&self.root);
            let uri = address.to_string();
            let writes = journal.begin_writes().await;
            journal.record(uri.clone());

            let target = address.clone();
            blocking_write(&writes, UploadStep::Allocate, move || target.ensure_directory())
                .await?;

            if let Some(path) = address.original_path() {
                blocking_write(&writes, UploadStep::WriteOriginal, move || {
                    write_file(&path, &data)
                })
                .await?;
            }

            let compressed = self
                .with_processor(UploadStep::Compress, |p| p.compress())
                .await?;
            let compressed = compressed.into_bytes();
            let path = address.compressed_path();
            let payload = compressed.clone();
            blocking_write(&writes, UploadStep::WriteCompressed, move || {
                write_file(&path, &payload)
            })
            .await?;
            drop(writes);

            let cost = compressed.len() as u64;
            self.cache.set(&uri, compressed, cost);

            info!(uri = %uri, format = %metadata.format, size = metadata.size, "Image stored");
            Ok(NewPhoto::from_metadata(
                metadata,
                description,
                uri,
                self.captured_at.unwrap_or_else(Utc::now),
            ))
        }
    }
}

/// Run one filesystem effect on the blocking pool
///
/// The task owns a clone of `writes`, so the journal does not settle before
/// the effect completes even when the awaiting future is dropped.
async fn blocking_write<F>(writes: &WriteGuard, step: UploadStep, f: F) -> StepResult<()>
where
    F: FnOnce() -> photovault_domain::Result<()> + Send + 'static,
{
    let writes = writes.clone();
    tokio::task::spawn_blocking(move || {
        let _writes = writes;
        f()
    })
    .await
    .map_err(|e| UploadError::new(step, VaultError::internal(format!("write task failed: {}", e))))?
    .map_err(|e| UploadError::new(step, e))
}

/// Write a whole file and flush it to disk
fn write_file(path: &Path, data: &[u8]) -> photovault_domain::Result<()> {
    let context = || format!("write {}", path.display());
    let mut file = File::create(path).map_err(|e| VaultError::io(context(), e))?;
    file.write_all(data)
        .map_err(|e| VaultError::io(context(), e))?;
    file.sync_all()
        .map_err(|e| VaultError::io(context(), e))?;
    debug!(path = %path.display(), size = data.len(), "File written");
    Ok(())
}
