//! Photo service - record lifecycle after ingestion

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{PhotoId, PhotoRecord, PhotoUpdate};
use crate::error::{Result, VaultError};
use crate::ports::{ImageStore, PhotoRepository};

/// Service for reading, updating and deleting committed photos
pub struct PhotoService<S, R> {
    store: Arc<S>,
    repository: Arc<R>,
}

impl<S, R> PhotoService<S, R>
where
    S: ImageStore,
    R: PhotoRepository,
{
    pub fn new(store: Arc<S>, repository: Arc<R>) -> Self {
        Self { store, repository }
    }

    /// Get a photo record
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` when no record has this id
    pub async fn get(&self, id: PhotoId) -> Result<PhotoRecord> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("photo {}", id)))
    }

    /// List all photo records
    pub async fn list(&self) -> Result<Vec<PhotoRecord>> {
        self.repository.list().await
    }

    /// Update the description and/or capture date of a photo
    #[instrument(skip(self, update), fields(photo_id = %id))]
    pub async fn update(&self, id: PhotoId, update: PhotoUpdate) -> Result<PhotoRecord> {
        if update.is_empty() {
            return self.get(id).await;
        }
        self.repository
            .update_by_id(id, update)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("photo {}", id)))
    }

    /// Delete a photo record and its stored files
    ///
    /// The record is removed first; a failure to remove the files afterwards
    /// is logged and does not resurrect the record.
    #[instrument(skip(self), fields(photo_id = %id))]
    pub async fn delete(&self, id: PhotoId) -> Result<PhotoRecord> {
        let record = self
            .repository
            .delete_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("photo {}", id)))?;

        if let Err(err) = self.store.delete(&record.photo.uri).await {
            warn!(uri = %record.photo.uri, error = %err, "Record deleted but stored files remain");
        } else {
            info!(uri = %record.photo.uri, "Photo deleted");
        }
        Ok(record)
    }
}
