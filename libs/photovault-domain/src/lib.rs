//! # photovault Domain Layer
//!
//! This crate contains the business logic and domain models of the photo
//! archive. It follows hexagonal architecture principles:
//!
//! - **Entities**: photo records, upload items, failure results
//! - **Ports**: traits for external dependencies (`PhotoRepository`,
//!   `ImageStore`, `ImageSource`)
//! - **Services**: batch ingestion and photo lifecycle orchestration
//!
//! ## Architecture
//!
//! This layer has NO dependencies on the filesystem, image codecs or HTTP.
//! Those are provided by adapter crates implementing the ports.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use photovault_domain::ingestion::{BatchIngestionService, UploadItem};
//! use photovault_domain::ports::{ImageStore, PhotoRepository};
//!
//! async fn example<S: ImageStore, R: PhotoRepository>(
//!     service: BatchIngestionService<S, R>,
//!     items: Vec<UploadItem>,
//! ) {
//!     match service.ingest(items).await {
//!         Ok(failures) => println!("{} item(s) failed", failures.len()),
//!         Err(err) => eprintln!("commit failed: {}", err),
//!     }
//! }
//! ```

pub mod error;
pub mod ingestion;
pub mod photo;
pub mod ports;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use error::{BatchCommitError, Result, UploadError, UploadStep, VaultError};
pub use ingestion::{BatchIngestionService, CorrelationId, FailureResult, UploadItem};
pub use photo::{ContentHash, ImageFormat, ImageMetadata, NewPhoto, PhotoId, PhotoRecord};
pub use ports::{ImageSource, ImageStore, PendingUpload, PhotoRepository};
