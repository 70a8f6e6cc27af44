//! Ports (trait definitions) for external dependencies
//!
//! This module defines the contracts (ports) that external adapters must implement.
//! Following hexagonal architecture, the domain defines what it needs, and the
//! infrastructure provides implementations.
//!
//! ## Static Dispatch
//!
//! We use native Rust async traits with `impl Future` return types instead of
//! `async_trait`. `ImageSource` is the exception: batches mix source kinds,
//! so it is used as a trait object.

use std::future::Future;
use std::io::Read;

use crate::error::{Result, UploadError};
use crate::ingestion::{CorrelationId, UploadItem, WriteJournal};
use crate::photo::{ContentHash, NewPhoto, PhotoId, PhotoRecord, PhotoUpdate};

/// Caller-supplied origin of an image's bytes
///
/// A source is single-use: `open` consumes it and yields the byte stream.
/// Implementations exist for in-memory buffers, files on disk and multipart
/// form fields.
pub trait ImageSource: Send {
    /// Display name (typically the uploaded file name)
    fn name(&self) -> &str;

    /// Consume the source and return its byte stream
    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>>;
}

/// Port for the persistence collaborator holding photo records
///
/// Content-hash uniqueness is enforced here at the record level, not only by
/// the batch pipeline.
pub trait PhotoRepository: Send + Sync + 'static {
    /// Find a record by id, `None` when absent
    fn find_by_id(&self, id: PhotoId) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send;

    /// Check whether a record with this content hash exists
    fn exists_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete a record, returning it when it existed
    fn delete_by_id(&self, id: PhotoId)
        -> impl Future<Output = Result<Option<PhotoRecord>>> + Send;

    /// Commit a set of candidate records
    ///
    /// All-or-nothing: either every record is committed and returned with
    /// its assigned id, or none is and an error is returned.
    fn bulk_create(
        &self,
        photos: Vec<NewPhoto>,
    ) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send;

    /// Update the mutable fields of a record, `None` when absent
    fn update_by_id(
        &self,
        id: PhotoId,
        update: PhotoUpdate,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send;

    /// All records ordered by id
    fn list(&self) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send;
}

/// Port for the image byte store (original and compressed variants)
pub trait ImageStore: Send + Sync + 'static {
    /// Per-item upload in progress
    type Upload: PendingUpload;

    /// Start the upload sequence for one batch item
    fn begin_upload(&self, item: UploadItem) -> Self::Upload;

    /// Remove whatever was written for an upload that will not be committed
    ///
    /// Missing files are not an error.
    fn discard(&self, uri: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove the stored variants of a committed image
    fn delete(&self, uri: &str) -> impl Future<Output = Result<()>> + Send;
}

/// One item's upload, split at the point where the batch gates run
///
/// `content_hash` reads and hashes the source without touching storage.
/// `finish` decodes, writes both variants and returns the candidate record.
pub trait PendingUpload: Send + 'static {
    fn correlation_id(&self) -> CorrelationId;

    fn display_name(&self) -> &str;

    /// Read the source once and return its content hash (memoized)
    fn content_hash(
        &mut self,
    ) -> impl Future<Output = std::result::Result<ContentHash, UploadError>> + Send;

    /// Complete the upload; the storage uri is recorded in `journal` before
    /// the first byte is written
    fn finish(
        self,
        journal: WriteJournal,
    ) -> impl Future<Output = std::result::Result<NewPhoto, UploadError>> + Send;
}
