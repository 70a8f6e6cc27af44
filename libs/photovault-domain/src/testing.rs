//! In-memory implementations of the ports for unit tests

use std::collections::HashSet;
use std::future::Future;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::error::{Result, UploadError, UploadStep, VaultError};
use crate::ingestion::{CorrelationId, UploadItem, WriteJournal};
use crate::photo::{
    ContentHash, ImageFormat, ImageMetadata, NewPhoto, PhotoId, PhotoRecord, PhotoUpdate,
};
use crate::ports::{ImageSource, ImageStore, PendingUpload, PhotoRepository};

pub struct BytesSource {
    name: String,
    data: Vec<u8>,
}

impl ImageSource for BytesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data)))
    }
}

pub fn bytes_item(id: u64, name: &str, data: &[u8]) -> UploadItem {
    UploadItem::new(
        CorrelationId::new(id),
        Box::new(BytesSource {
            name: name.to_string(),
            data: data.to_vec(),
        }),
    )
}

#[derive(Default)]
struct StoreState {
    begun: Vec<CorrelationId>,
    finished: Vec<CorrelationId>,
    stored: HashSet<String>,
    discarded: Vec<String>,
    deleted: Vec<String>,
}

/// Image store keeping uris in memory
///
/// Display names drive the behavior: `slow*` hangs after the first write,
/// `held*` pauses briefly after it, `lingering*` keeps writing on the
/// blocking pool for a while, `broken*` fails while writing the compressed
/// variant.
#[derive(Default)]
pub struct FakeImageStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_of(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn begun(&self) -> Vec<CorrelationId> {
        self.state.lock().unwrap().begun.clone()
    }

    pub fn finished(&self) -> Vec<CorrelationId> {
        self.state.lock().unwrap().finished.clone()
    }

    pub fn stored_uris(&self) -> HashSet<String> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.state.lock().unwrap().discarded.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

pub struct FakeUpload {
    item: Option<UploadItem>,
    correlation_id: CorrelationId,
    name: String,
    description: String,
    data: Option<Vec<u8>>,
    state: Arc<Mutex<StoreState>>,
}

impl ImageStore for FakeImageStore {
    type Upload = FakeUpload;

    fn begin_upload(&self, item: UploadItem) -> FakeUpload {
        self.state.lock().unwrap().begun.push(item.correlation_id);
        FakeUpload {
            correlation_id: item.correlation_id,
            name: item.display_name().to_string(),
            description: item.description.clone(),
            item: Some(item),
            data: None,
            state: self.state.clone(),
        }
    }

    fn discard(&self, uri: &str) -> impl Future<Output = Result<()>> + Send {
        let mut state = self.state.lock().unwrap();
        state.stored.remove(uri);
        state.discarded.push(uri.to_string());
        async { Ok(()) }
    }

    fn delete(&self, uri: &str) -> impl Future<Output = Result<()>> + Send {
        let mut state = self.state.lock().unwrap();
        let result = if state.stored.remove(uri) {
            state.deleted.push(uri.to_string());
            Ok(())
        } else {
            Err(VaultError::NotFound(uri.to_string()))
        };
        async move { result }
    }
}

impl PendingUpload for FakeUpload {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn content_hash(
        &mut self,
    ) -> impl Future<Output = std::result::Result<ContentHash, UploadError>> + Send {
        let result = match self.item.take() {
            Some(item) => {
                let mut data = Vec::new();
                item.source
                    .open()
                    .and_then(|mut reader| {
                        reader
                            .read_to_end(&mut data)
                            .map_err(|e| VaultError::io("read source", e))
                    })
                    .map_err(|e| UploadError::new(UploadStep::Read, e))
                    .map(|_| {
                        let hash = ContentHash::from_hex(FakeImageStore::hash_of(&data));
                        self.data = Some(data);
                        hash
                    })
            }
            None => Ok(ContentHash::from_hex(FakeImageStore::hash_of(
                self.data.as_deref().unwrap_or_default(),
            ))),
        };
        async move { result }
    }

    fn finish(
        mut self,
        journal: WriteJournal,
    ) -> impl Future<Output = std::result::Result<NewPhoto, UploadError>> + Send {
        async move {
            let hash = self.content_hash().await?;
            let uri = format!("local://fake/{}", self.correlation_id);
            journal.record(uri.clone());
            {
                let mut state = self.state.lock().unwrap();
                state.finished.push(self.correlation_id);
                state.stored.insert(uri.clone());
            }

            if self.name.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.name.starts_with("held") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if self.name.starts_with("lingering") {
                let writes = journal.begin_writes().await;
                let state = self.state.clone();
                let late_uri = uri.clone();
                let _ = tokio::task::spawn_blocking(move || {
                    let _writes = writes;
                    std::thread::sleep(Duration::from_millis(300));
                    state.lock().unwrap().stored.insert(late_uri);
                })
                .await;
            }
            if self.name.starts_with("broken") {
                return Err(UploadError::new(
                    UploadStep::WriteCompressed,
                    VaultError::io("write compressed", std::io::Error::other("disk full")),
                ));
            }

            let size = self.data.as_ref().map(|d| d.len() as u64).unwrap_or(0);
            Ok(NewPhoto::from_metadata(
                ImageMetadata {
                    content_hash: hash,
                    size,
                    format: ImageFormat::Jpeg,
                    width: 1,
                    height: 1,
                },
                self.description.clone(),
                uri,
                Utc::now(),
            ))
        }
    }
}

#[derive(Default)]
struct RepoState {
    records: Vec<PhotoRecord>,
    seeded: HashSet<ContentHash>,
    next_id: u64,
    bulk_calls: usize,
}

/// Repository keeping records in a vector
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<RepoState>,
    fail_commits: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_commits() -> Self {
        Self {
            fail_commits: true,
            ..Self::default()
        }
    }

    pub fn seed_hash(&self, hash: ContentHash) {
        self.state.lock().unwrap().seeded.insert(hash);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn bulk_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_calls
    }
}

impl PhotoRepository for InMemoryRepository {
    fn find_by_id(&self, id: PhotoId) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        let state = self.state.lock().unwrap();
        let found = state.records.iter().find(|r| r.id == id).cloned();
        async move { Ok(found) }
    }

    fn exists_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> impl Future<Output = Result<bool>> + Send {
        let state = self.state.lock().unwrap();
        let exists = state.seeded.contains(hash)
            || state.records.iter().any(|r| &r.photo.content_hash == hash);
        async move { Ok(exists) }
    }

    fn delete_by_id(
        &self,
        id: PhotoId,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        let mut state = self.state.lock().unwrap();
        let removed = state
            .records
            .iter()
            .position(|r| r.id == id)
            .map(|idx| state.records.remove(idx));
        async move { Ok(removed) }
    }

    fn bulk_create(
        &self,
        photos: Vec<NewPhoto>,
    ) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        let mut hashes: HashSet<ContentHash> = state
            .records
            .iter()
            .map(|r| r.photo.content_hash.clone())
            .collect();
        let conflict = photos
            .iter()
            .find(|p| !hashes.insert(p.content_hash.clone()))
            .map(|p| p.content_hash.clone());

        let result = if self.fail_commits {
            Err(VaultError::repository("commit rejected"))
        } else if let Some(hash) = conflict {
            Err(VaultError::repository(format!(
                "content hash {} is already catalogued",
                hash
            )))
        } else {
            let created: Vec<PhotoRecord> = photos
                .into_iter()
                .map(|photo| {
                    state.next_id += 1;
                    PhotoRecord::new(PhotoId::new(state.next_id), photo)
                })
                .collect();
            state.records.extend(created.iter().cloned());
            Ok(created)
        };
        async move { result }
    }

    fn update_by_id(
        &self,
        id: PhotoId,
        update: PhotoUpdate,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        let mut state = self.state.lock().unwrap();
        let updated = state.records.iter_mut().find(|r| r.id == id).map(|record| {
            record.apply(&update);
            record.clone()
        });
        async move { Ok(updated) }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        let records = self.state.lock().unwrap().records.clone();
        async move { Ok(records) }
    }
}
