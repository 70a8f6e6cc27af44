//! Domain entities for batch ingestion
//!
//! An `UploadItem` is one entry of a caller's batch. Every item terminates
//! either as a committed record or as a `FailureResult` carrying the
//! caller's correlation id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ports::ImageSource;

/// Caller-supplied identifier mapping batch results back to caller items
/// (e.g. the upload slot number of a form)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of an upload batch
///
/// The item owns its `ImageSource`; the pipeline consumes it exactly once.
pub struct UploadItem {
    pub correlation_id: CorrelationId,
    pub description: String,
    /// Capture timestamp; defaults to the upload time when absent
    pub captured_at: Option<DateTime<Utc>>,
    pub source: Box<dyn ImageSource>,
}

impl UploadItem {
    pub fn new(correlation_id: CorrelationId, source: Box<dyn ImageSource>) -> Self {
        Self {
            correlation_id,
            description: String::new(),
            captured_at: None,
            source,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// Display name of the underlying source
    pub fn display_name(&self) -> &str {
        self.source.name()
    }
}

impl fmt::Debug for UploadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadItem")
            .field("correlation_id", &self.correlation_id)
            .field("description", &self.description)
            .field("captured_at", &self.captured_at)
            .field("source", &self.source.name())
            .finish()
    }
}

/// Description annotated with the display name, unless it already contains it
///
/// Retried uploads keep their description intact instead of accumulating
/// the same file name twice.
pub fn annotate_description(description: &str, display_name: &str) -> String {
    if display_name.is_empty() || description.contains(display_name) {
        return description.to_string();
    }
    if description.is_empty() {
        display_name.to_string()
    } else {
        format!("{}\n{}", description, display_name)
    }
}

/// A per-item failure returned verbatim to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResult {
    pub correlation_id: CorrelationId,
    pub message: String,
}

impl FailureResult {
    pub fn new(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            message: message.into(),
        }
    }
}
