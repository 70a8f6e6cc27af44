//! Photo domain module
//!
//! Records of stored photos, their identifiers and the service managing
//! their lifecycle once ingested.

mod entity;
mod ids;
mod service;

pub use entity::{ImageFormat, ImageMetadata, NewPhoto, PhotoRecord, PhotoUpdate};
pub use ids::{ContentHash, PhotoId};
pub use service::PhotoService;
