//! Batch ingestion service - business logic orchestration
//!
//! A batch of `UploadItem`s is pushed into a closed task queue drained by a
//! fixed pool of workers. Each worker hashes its item, claims the hash in the
//! service-wide `DedupGate`, asks the repository whether the content is
//! already stored, and only then lets the image store write anything.
//! Outcomes flow back on an aggregation channel; after every worker has
//! joined, the successful candidates are committed with a single
//! `bulk_create` call and the batch's claims are released.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::{BatchClaims, ClaimConflict, CorrelationId, DedupGate, FailureResult, UploadItem, WriteJournal};
use crate::error::{BatchCommitError, VaultError};
use crate::photo::NewPhoto;
use crate::ports::{ImageStore, PendingUpload, PhotoRepository};

type ItemError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration for the batch ingestion service
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of concurrent workers (default: 8)
    pub workers: usize,
    /// Optional per-batch deadline (default: none)
    pub deadline: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            deadline: None,
        }
    }
}

/// Service ingesting batches of uploads with bounded parallelism
///
/// Guarantees:
/// - at most one of several byte-identical items of a batch is stored
/// - content already known to the repository, or being stored by a
///   concurrent batch of the same service, is rejected before any write
/// - every item ends up either committed or in the returned failure list
/// - a failed commit is reported as `BatchCommitError`, keeping the
///   per-item failures and naming the items that were not committed
pub struct BatchIngestionService<S, R> {
    store: Arc<S>,
    repository: Arc<R>,
    gate: Arc<DedupGate>,
    config: BatchConfig,
}

impl<S, R> BatchIngestionService<S, R>
where
    S: ImageStore,
    R: PhotoRepository,
{
    pub fn new(store: Arc<S>, repository: Arc<R>, config: BatchConfig) -> Self {
        Self {
            store,
            repository,
            gate: Arc::new(DedupGate::new()),
            config,
        }
    }

    /// Create a service with the default configuration
    pub fn with_defaults(store: Arc<S>, repository: Arc<R>) -> Self {
        Self::new(store, repository, BatchConfig::default())
    }

    /// Ingest a batch and return the per-item failures
    ///
    /// Items absent from the returned list were committed.
    ///
    /// # Errors
    ///
    /// Returns `BatchCommitError` when the final bulk persist fails. The
    /// files written for the uncommitted items are removed before returning.
    #[instrument(skip(self, items), fields(batch_size = items.len(), workers = self.config.workers))]
    pub async fn ingest(
        &self,
        items: Vec<UploadItem>,
    ) -> Result<Vec<FailureResult>, BatchCommitError> {
        if items.is_empty() {
            debug!("Empty batch, nothing to ingest");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let deadline = self.config.deadline.map(|d| started + d);
        let expected: Vec<CorrelationId> = items.iter().map(|i| i.correlation_id).collect();
        let mut failures = Vec::new();

        // Closed queue: every task is enqueued before the first worker starts.
        let (queue_tx, queue_rx) = async_channel::bounded(items.len());
        for item in items {
            if let Err(err) = queue_tx.try_send(item) {
                let item = err.into_inner();
                failures.push(FailureResult::new(
                    item.correlation_id,
                    "could not be queued for processing",
                ));
            }
        }
        drop(queue_tx);

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        // Held until the commit below has returned.
        let claims = Arc::new(self.gate.open_batch());
        let in_flight: Arc<Mutex<HashMap<CorrelationId, WriteJournal>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let worker_count = self.config.workers.clamp(1, expected.len());

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let worker = Worker {
                id,
                store: self.store.clone(),
                repository: self.repository.clone(),
                claims: claims.clone(),
                in_flight: in_flight.clone(),
                results: results_tx.clone(),
                started,
                deadline,
            };
            workers.spawn(worker.run(queue_rx.clone()));
        }
        drop(queue_rx);
        drop(results_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Ingestion worker terminated abnormally");
            }
        }

        let mut stored = Vec::new();
        let mut seen = HashSet::new();
        while let Some(outcome) = results_rx.recv().await {
            match outcome {
                Outcome::Stored {
                    correlation_id,
                    photo,
                } => {
                    seen.insert(correlation_id);
                    stored.push((correlation_id, photo));
                }
                Outcome::Failed(failure) => {
                    seen.insert(failure.correlation_id);
                    failures.push(failure);
                }
            }
        }

        // A worker that died mid-item produced no outcome for it.
        for correlation_id in expected.iter().filter(|id| !seen.contains(id)) {
            if failures.iter().any(|f| f.correlation_id == *correlation_id) {
                continue;
            }
            let journal = in_flight
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(correlation_id);
            if let Some(journal) = journal {
                journal.settled().await;
                if let Some(uri) = journal.recorded() {
                    self.discard(&uri).await;
                }
            }
            failures.push(FailureResult::new(
                *correlation_id,
                "processing aborted unexpectedly",
            ));
        }

        failures.sort_by_key(|f| f.correlation_id);

        if stored.is_empty() {
            info!(
                failed = failures.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Batch finished without records to commit"
            );
            return Ok(failures);
        }

        let (committed_ids, photos): (Vec<CorrelationId>, Vec<NewPhoto>) =
            stored.into_iter().unzip();
        let uris: Vec<String> = photos.iter().map(|p| p.uri.clone()).collect();

        let committed = match self.repository.bulk_create(photos).await {
            Ok(records) => {
                info!(
                    committed = records.len(),
                    failed = failures.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch ingested"
                );
                Ok(failures)
            }
            Err(source) => {
                error!(
                    error = %source,
                    uncommitted = committed_ids.len(),
                    failed = failures.len(),
                    "Batch commit failed, rolling back stored files"
                );
                for uri in &uris {
                    self.discard(uri).await;
                }
                Err(BatchCommitError {
                    failures,
                    uncommitted: committed_ids,
                    source,
                })
            }
        };
        drop(claims);
        committed
    }

    /// Get the service configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Content hashes claimed by batches still in flight
    pub fn claimed_hashes(&self) -> usize {
        self.gate.len()
    }

    async fn discard(&self, uri: &str) {
        if let Err(err) = self.store.discard(uri).await {
            warn!(uri = %uri, error = %err, "Failed to remove files of uncommitted upload");
        }
    }
}

enum Outcome {
    Stored {
        correlation_id: CorrelationId,
        photo: NewPhoto,
    },
    Failed(FailureResult),
}

struct Worker<S, R> {
    id: usize,
    store: Arc<S>,
    repository: Arc<R>,
    claims: Arc<BatchClaims>,
    in_flight: Arc<Mutex<HashMap<CorrelationId, WriteJournal>>>,
    results: mpsc::UnboundedSender<Outcome>,
    started: Instant,
    deadline: Option<Instant>,
}

impl<S, R> Worker<S, R>
where
    S: ImageStore,
    R: PhotoRepository,
{
    async fn run(self, queue: async_channel::Receiver<UploadItem>) {
        let mut processed = 0usize;

        while let Ok(item) = queue.recv().await {
            let correlation_id = item.correlation_id;
            processed += 1;

            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.emit(Outcome::Failed(FailureResult::new(
                    correlation_id,
                    self.timeout().to_string(),
                )));
                continue;
            }

            let journal = WriteJournal::new();
            self.in_flight
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .insert(correlation_id, journal.clone());

            let result = match self.deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.process(item, journal.clone()))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(self.timeout().into()),
                    }
                }
                None => self.process(item, journal.clone()).await,
            };

            let outcome = match result {
                Ok(photo) => {
                    debug!(worker = self.id, correlation_id = %correlation_id, uri = %photo.uri, "Item stored");
                    Outcome::Stored {
                        correlation_id,
                        photo,
                    }
                }
                Err(err) => {
                    warn!(worker = self.id, correlation_id = %correlation_id, error = %err, "Item failed");
                    // Blocking writes may outlive a timed-out upload future.
                    journal.settled().await;
                    if let Some(uri) = journal.recorded() {
                        if let Err(cleanup) = self.store.discard(&uri).await {
                            warn!(uri = %uri, error = %cleanup, "Failed to remove files of failed upload");
                        }
                    }
                    Outcome::Failed(FailureResult::new(correlation_id, err.to_string()))
                }
            };

            self.in_flight
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&correlation_id);
            self.emit(outcome);
        }

        debug!(worker = self.id, processed, "Worker finished");
    }

    async fn process(&self, item: UploadItem, journal: WriteJournal) -> Result<NewPhoto, ItemError> {
        let mut upload = self.store.begin_upload(item);
        let hash = upload.content_hash().await?;

        match self.claims.claim(&hash, upload.display_name()) {
            Ok(()) => {}
            Err(ClaimConflict::SameBatch { existing }) => {
                return Err(VaultError::DuplicateContent {
                    name: upload.display_name().to_string(),
                    existing,
                }
                .into());
            }
            Err(ClaimConflict::OtherBatch) => {
                return Err(VaultError::AlreadyExists(hash.to_string()).into());
            }
        }

        let result: Result<NewPhoto, ItemError> = async {
            if self.repository.exists_by_content_hash(&hash).await? {
                return Err(VaultError::AlreadyExists(hash.to_string()).into());
            }
            Ok(upload.finish(journal).await?)
        }
        .await;
        if result.is_err() {
            self.claims.release(&hash);
        }
        result
    }

    fn emit(&self, outcome: Outcome) {
        // The receiver outlives every worker.
        let _ = self.results.send(outcome);
    }

    fn timeout(&self) -> VaultError {
        VaultError::Timeout {
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
