use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Records the storage uri an upload is writing to
///
/// The orchestrator keeps a clone while the upload runs, so it can remove
/// partially written files when the upload fails, times out or is not
/// committed. Writers hold a `WriteGuard` for as long as a filesystem effect
/// may still land, including on the blocking pool after the upload future
/// itself was dropped; `settled` waits for every guard to go away.
#[derive(Debug, Clone, Default)]
pub struct WriteJournal {
    uri: Arc<Mutex<Option<String>>>,
    writes: Arc<RwLock<()>>,
}

/// Shared proof that writes for a journal may be in flight
#[derive(Debug, Clone)]
pub struct WriteGuard {
    _lock: Arc<OwnedRwLockWriteGuard<()>>,
}

impl WriteJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the uri about to be written
    pub fn record(&self, uri: impl Into<String>) {
        *self.uri.lock().unwrap_or_else(|p| p.into_inner()) = Some(uri.into());
    }

    /// The uri recorded so far, if any
    pub fn recorded(&self) -> Option<String> {
        self.uri.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Mark the start of filesystem writes
    ///
    /// Clone the guard into every blocking task that writes; the journal
    /// settles once the last clone is dropped.
    pub async fn begin_writes(&self) -> WriteGuard {
        WriteGuard {
            _lock: Arc::new(self.writes.clone().write_owned().await),
        }
    }

    /// Wait until no write started through this journal is still running
    pub async fn settled(&self) {
        drop(self.writes.read().await);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_clones_share_the_record() {
        let journal = WriteJournal::new();
        let handle = journal.clone();

        assert_eq!(journal.recorded(), None);
        handle.record("local://a/b");
        assert_eq!(journal.recorded().as_deref(), Some("local://a/b"));
    }

    #[tokio::test]
    async fn test_settled_without_writes_returns_immediately() {
        WriteJournal::new().settled().await;
    }

    #[tokio::test]
    async fn test_settled_waits_for_blocking_writer() {
        let journal = WriteJournal::new();
        let guard = journal.begin_writes().await;

        let written = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        tokio::task::spawn_blocking({
            let guard = guard.clone();
            let written = written.clone();
            move || {
                let _guard = guard;
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(100));
                written.store(true, Ordering::SeqCst);
            }
        });
        started_rx.recv().unwrap();

        // The future that started the writes goes away first.
        drop(guard);
        journal.settled().await;

        assert!(written.load(Ordering::SeqCst));
    }
}
