//! # photovault Filesystem Adapter
//!
//! Local-disk implementation of the `ImageStore` port:
//!
//! - [`StorageAddress`]: scheme-tagged locator of an image's variants
//! - [`ImageProcessor`]: hashing, decoding and preview compression
//! - [`ImageCache`]: bounded cache of compressed renditions
//! - [`UploadCoordinator`], [`DownloadCoordinator`], [`DeleteCoordinator`]
//! - [`LocalImageStore`]: binds a files root and the cache

pub mod address;
pub mod cache;
pub mod delete;
pub mod download;
pub mod processor;
pub mod source;
pub mod store;
pub mod upload;

#[cfg(test)]
mod testing;

pub use address::{OriginalLocation, Scheme, StorageAddress};
pub use cache::{CacheConfig, ImageCache};
pub use delete::DeleteCoordinator;
pub use download::DownloadCoordinator;
pub use processor::{Compressed, ImageProcessor, JPEG_PREVIEW_QUALITY};
pub use source::{FileSource, MemorySource, RemoteSource};
pub use store::LocalImageStore;
pub use upload::UploadCoordinator;
