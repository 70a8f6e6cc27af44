//! Content-hash deduplication gate
//!
//! One gate is shared by every batch of an ingestion service. A batch opens
//! a `BatchClaims` ticket and its workers race to claim content hashes
//! through it. The first claimant wins. A later claimant of the same batch
//! learns the winner's display name; a claimant of another batch learns
//! that the content is already being stored. Claims are released when the
//! ticket is dropped, which the service does only after its commit.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::photo::ContentHash;

#[derive(Debug)]
struct Claim {
    batch: u64,
    name: String,
}

/// Reason a hash could not be claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimConflict {
    /// An earlier item of the same batch holds the hash
    SameBatch { existing: String },
    /// A concurrent batch holds the hash and has not committed yet
    OtherBatch,
}

/// Concurrent-safe registry of content hashes currently being ingested
#[derive(Debug, Default)]
pub struct DedupGate {
    claims: Mutex<HashMap<ContentHash, Claim>>,
    next_batch: AtomicU64,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a claim ticket for a new batch
    pub fn open_batch(self: &Arc<Self>) -> BatchClaims {
        BatchClaims {
            gate: self.clone(),
            batch: self.next_batch.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn claim(&self, batch: u64, hash: &ContentHash, name: &str) -> Result<(), ClaimConflict> {
        let mut claims = self
            .claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match claims.entry(hash.clone()) {
            Entry::Occupied(entry) if entry.get().batch == batch => Err(ClaimConflict::SameBatch {
                existing: entry.get().name.clone(),
            }),
            Entry::Occupied(_) => Err(ClaimConflict::OtherBatch),
            Entry::Vacant(entry) => {
                entry.insert(Claim {
                    batch,
                    name: name.to_string(),
                });
                Ok(())
            }
        }
    }

    fn release_one(&self, batch: u64, hash: &ContentHash) {
        let mut claims = self
            .claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if claims.get(hash).is_some_and(|claim| claim.batch == batch) {
            claims.remove(hash);
        }
    }

    fn release(&self, batch: u64) {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|_, claim| claim.batch != batch);
    }

    /// Number of hashes currently claimed, across all batches
    pub fn len(&self) -> usize {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Claims held by one batch; dropping it releases them all
#[derive(Debug)]
pub struct BatchClaims {
    gate: Arc<DedupGate>,
    batch: u64,
}

impl BatchClaims {
    /// Atomically claim `hash` for the item named `name`
    pub fn claim(&self, hash: &ContentHash, name: &str) -> Result<(), ClaimConflict> {
        self.gate.claim(self.batch, hash, name)
    }

    /// Give up a claim of this batch, after its item failed
    pub fn release(&self, hash: &ContentHash) {
        self.gate.release_one(self.batch, hash);
    }
}

impl Drop for BatchClaims {
    fn drop(&mut self) {
        self.gate.release(self.batch);
    }
}
