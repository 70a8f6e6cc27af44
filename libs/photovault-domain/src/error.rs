//! Domain errors for photovault
//!
//! This module defines all possible errors that can occur while ingesting,
//! serving and deleting photos. Adapters convert their infrastructure
//! failures (filesystem, codecs, catalog) into these variants.

use std::fmt;

use thiserror::Error;

use crate::ingestion::{CorrelationId, FailureResult};

/// Errors that can occur in the photo pipeline
#[derive(Error, Debug)]
pub enum VaultError {
    /// The storage URI does not start with a recognized scheme or is malformed
    #[error("Invalid storage uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The decoded container format is outside the supported set
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Two items of the same batch carry byte-identical content
    #[error("Duplicate content: '{name}' has the same content as '{existing}'")]
    DuplicateContent { name: String, existing: String },

    /// The content hash is already stored by a previous batch
    #[error("file exists: content hash {0} is already stored")]
    AlreadyExists(String),

    /// A filesystem operation failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The compressed rendition could not be produced
    #[error("Failed to compress image: {0}")]
    Compression(String),

    /// Remote (ftp/scp) transfer is not available
    #[error("Remote storage is not supported: {0}")]
    RemoteUnsupported(String),

    /// The persistence collaborator failed
    #[error("Repository operation failed: {0}")]
    Repository(String),

    /// The batch deadline expired before the item completed
    #[error("Timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A requested entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// An unexpected internal error occurred
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Create an invalid uri error
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error with the operation that failed
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a repository error with a message
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a decode error with a message
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error reports content that is already known
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateContent { .. } | Self::AlreadyExists(_))
    }
}

/// Result type alias for photovault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Step of the per-item upload sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    Read,
    Decode,
    Allocate,
    WriteOriginal,
    Compress,
    WriteCompressed,
}

impl UploadStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Decode => "decode",
            Self::Allocate => "allocate",
            Self::WriteOriginal => "write-original",
            Self::Compress => "compress",
            Self::WriteCompressed => "write-compressed",
        }
    }
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-item upload failure tagged with the step that produced it
#[derive(Error, Debug)]
#[error("{step} step failed: {source}")]
pub struct UploadError {
    pub step: UploadStep,
    #[source]
    pub source: VaultError,
}

impl UploadError {
    pub fn new(step: UploadStep, source: VaultError) -> Self {
        Self { step, source }
    }
}

/// Failure of the final bulk-persist call of a batch
///
/// Carries the per-item failures collected before the commit together with
/// the correlation ids whose records could not be committed.
#[derive(Error, Debug)]
#[error("Batch commit failed for {} item(s): {source}", uncommitted.len())]
pub struct BatchCommitError {
    pub failures: Vec<FailureResult>,
    pub uncommitted: Vec<CorrelationId>,
    #[source]
    pub source: VaultError,
}
