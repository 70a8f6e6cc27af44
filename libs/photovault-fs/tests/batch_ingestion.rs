//! Batch pipeline against a real files root and real images

use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{ImageFormat as Codec, Rgb, RgbImage};
use photovault_domain::ingestion::BatchConfig;
use photovault_domain::photo::{PhotoService, PhotoUpdate};
use photovault_domain::{
    BatchIngestionService, ContentHash, CorrelationId, NewPhoto, PhotoId, PhotoRecord,
    PhotoRepository, Result, UploadItem, VaultError,
};
use photovault_catalog::SqliteCatalog;
use photovault_fs::{CacheConfig, ImageCache, LocalImageStore, MemorySource};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn image_bytes(seed: u8, codec: Codec) -> Vec<u8> {
    let img = RgbImage::from_fn(24, 16, |x, y| Rgb([x as u8 ^ seed, y as u8, seed]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, codec).unwrap();
    out.into_inner()
}

fn item(id: u64, name: &str, data: Vec<u8>) -> UploadItem {
    UploadItem::new(CorrelationId::new(id), Box::new(MemorySource::new(name, data)))
}

/// Every regular file below `root`
fn files_under(root: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

/// Repository whose commits always fail, remembering what it was offered
#[derive(Default)]
struct RejectingRepository {
    offered: Mutex<Vec<String>>,
}

impl RejectingRepository {
    fn offered_uris(&self) -> Vec<String> {
        self.offered.lock().unwrap().clone()
    }
}

impl PhotoRepository for RejectingRepository {
    fn find_by_id(&self, _id: PhotoId) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async { Ok(None) }
    }

    fn exists_by_content_hash(
        &self,
        _hash: &ContentHash,
    ) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(false) }
    }

    fn delete_by_id(
        &self,
        _id: PhotoId,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async { Ok(None) }
    }

    fn bulk_create(
        &self,
        photos: Vec<NewPhoto>,
    ) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        self.offered
            .lock()
            .unwrap()
            .extend(photos.into_iter().map(|p| p.uri));
        async { Err(VaultError::repository("database is locked")) }
    }

    fn update_by_id(
        &self,
        _id: PhotoId,
        _update: PhotoUpdate,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async { Ok(None) }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        async { Ok(Vec::new()) }
    }
}

struct Harness {
    root: tempfile::TempDir,
    _db_dir: tempfile::TempDir,
    store: Arc<LocalImageStore>,
    catalog: Arc<SqliteCatalog>,
    service: BatchIngestionService<LocalImageStore, SqliteCatalog>,
}

impl Harness {
    async fn committed(&self) -> usize {
        self.catalog.list().await.unwrap().len()
    }
}

fn local_store(root: &Path) -> Arc<LocalImageStore> {
    let cache = Arc::new(ImageCache::new(CacheConfig::default()));
    Arc::new(LocalImageStore::new(root, cache))
}

async fn harness(workers: usize) -> Harness {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    let store = local_store(root.path());
    let catalog = Arc::new(
        SqliteCatalog::open(db_dir.path().join("photos.db"))
            .await
            .unwrap(),
    );
    let service = BatchIngestionService::new(
        store.clone(),
        catalog.clone(),
        BatchConfig {
            workers,
            deadline: None,
        },
    );
    Harness {
        root,
        _db_dir: db_dir,
        store,
        catalog,
        service,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_images_are_all_committed() {
    let h = harness(8).await;

    let failures = h
        .service
        .ingest(vec![
            item(1, "a.png", image_bytes(1, Codec::Png)),
            item(2, "b.jpg", image_bytes(2, Codec::Jpeg)),
            item(3, "c.png", image_bytes(3, Codec::Png)),
        ])
        .await
        .unwrap();

    assert!(failures.is_empty(), "{:?}", failures);
    assert_eq!(h.committed().await, 3);
    // Original and compressed for each image.
    assert_eq!(files_under(h.root.path()).len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identical_bytes_in_one_batch_store_once() {
    let h = harness(8).await;
    let data = image_bytes(7, Codec::Png);

    let failures = h
        .service
        .ingest(vec![item(1, "aaa", data.clone()), item(2, "bbb", data)])
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.contains("aaa"));
    assert!(failures[0].message.contains("bbb"));
    assert_eq!(h.committed().await, 1);
    assert_eq!(files_under(h.root.path()).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn known_content_is_rejected_without_writes() {
    let h = harness(2).await;
    let data = image_bytes(9, Codec::Jpeg);
    h.service.ingest(vec![item(1, "first.jpg", data.clone())]).await.unwrap();
    let before = files_under(h.root.path());

    let failures = h
        .service
        .ingest(vec![item(1, "again.jpg", data)])
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.contains("file exists"));
    assert_eq!(files_under(h.root.path()), before);
    assert_eq!(h.committed().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undecodable_items_fail_without_leftovers() {
    let h = harness(4).await;

    let failures = h
        .service
        .ingest(vec![
            item(1, "ok.png", image_bytes(4, Codec::Png)),
            item(2, "notes.txt", b"plain text".to_vec()),
        ])
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].correlation_id, CorrelationId::new(2));
    assert!(failures[0].message.contains("decode"));
    assert_eq!(files_under(h.root.path()).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn committed_photo_can_be_served_and_deleted() {
    let h = harness(2).await;
    h.service
        .ingest(vec![item(1, "a.jpg", image_bytes(5, Codec::Jpeg)).with_description("kitchen")])
        .await
        .unwrap();
    let photos = PhotoService::new(h.store.clone(), h.catalog.clone());
    let record = photos.list().await.unwrap().remove(0);
    assert_eq!(record.photo.description, "kitchen\na.jpg");

    let preview = h
        .store
        .downloader(&record.photo.uri)
        .unwrap()
        .compressed()
        .await
        .unwrap();
    assert!(!preview.is_empty());

    photos.delete(record.id).await.unwrap();

    assert_eq!(h.committed().await, 0);
    assert!(files_under(h.root.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_sharing_an_image_commit_their_other_items() {
    let h = harness(4).await;
    let shared = image_bytes(40, Codec::Png);

    let (first, second) = tokio::join!(
        h.service.ingest(vec![
            item(1, "shared.png", shared.clone()),
            item(2, "a2.png", image_bytes(41, Codec::Png)),
            item(3, "a3.jpg", image_bytes(42, Codec::Jpeg)),
        ]),
        h.service.ingest(vec![
            item(1, "shared-copy.png", shared),
            item(2, "b2.png", image_bytes(43, Codec::Png)),
            item(3, "b3.jpg", image_bytes(44, Codec::Jpeg)),
        ]),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    let failures: Vec<_> = first.iter().chain(second.iter()).collect();
    assert_eq!(failures.len(), 1, "{:?}", failures);
    assert_eq!(failures[0].correlation_id, CorrelationId::new(1));
    assert!(failures[0].message.contains("file exists"));
    assert_eq!(h.committed().await, 5);
    assert_eq!(files_under(h.root.path()).len(), 10);
    assert_eq!(h.service.claimed_hashes(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_commit_removes_files_and_cache_entries() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let store = local_store(root.path());
    let repository = Arc::new(RejectingRepository::default());
    let service = BatchIngestionService::new(
        store.clone(),
        repository.clone(),
        BatchConfig {
            workers: 4,
            deadline: None,
        },
    );
    let duplicated = image_bytes(50, Codec::Png);

    let err = service
        .ingest(vec![
            item(1, "aaa", duplicated.clone()),
            item(2, "bbb", duplicated),
            item(3, "c.jpg", image_bytes(51, Codec::Jpeg)),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.failures.len(), 1);
    assert!(err.failures[0].message.contains("Duplicate content"));
    assert_eq!(err.uncommitted.len(), 2);
    assert!(err.uncommitted.contains(&CorrelationId::new(3)));

    let offered = repository.offered_uris();
    assert_eq!(offered.len(), 2);
    for uri in &offered {
        assert!(store.cache().get(uri).is_none(), "{} still cached", uri);
    }
    assert!(files_under(root.path()).is_empty());
}
