//! Ingestion domain module
//!
//! This module contains the batch upload pipeline: the items a caller
//! submits, the per-item failures it gets back, and the orchestrator that
//! deduplicates and commits a batch.

mod entity;
mod gate;
mod journal;
mod service;

pub use entity::{annotate_description, CorrelationId, FailureResult, UploadItem};
pub use gate::{BatchClaims, ClaimConflict, DedupGate};
pub use journal::{WriteGuard, WriteJournal};
pub use service::{BatchConfig, BatchIngestionService};
