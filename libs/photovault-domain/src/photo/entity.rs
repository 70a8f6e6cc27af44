//! Domain entities for stored photos
//!
//! A `NewPhoto` is the candidate record produced by the upload pipeline.
//! It becomes a `PhotoRecord` once the persistence collaborator commits it
//! and assigns an id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::photo::ids::{ContentHash, PhotoId};

/// Container formats accepted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// MIME type used when serving the original bytes
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts extracted once from the raw bytes of an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub content_hash: ContentHash,
    /// Exact byte length of the raw payload
    pub size: u64,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Candidate record produced by a successful upload, not yet committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub description: String,
    pub format: ImageFormat,
    /// Storage address string (e.g. `local://202401/05/13/...`)
    pub uri: String,
    pub content_hash: ContentHash,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl NewPhoto {
    /// Build a candidate record from extracted metadata
    pub fn from_metadata(
        metadata: ImageMetadata,
        description: String,
        uri: String,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            description,
            format: metadata.format,
            uri,
            content_hash: metadata.content_hash,
            size: metadata.size,
            width: metadata.width,
            height: metadata.height,
            captured_at,
        }
    }

    /// Resolution in the `<width>x<height>` form
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A committed photo record, owned by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    #[serde(flatten)]
    pub photo: NewPhoto,
}

impl PhotoRecord {
    pub fn new(id: PhotoId, photo: NewPhoto) -> Self {
        Self { id, photo }
    }

    /// Apply the fields present in an update
    pub fn apply(&mut self, update: &PhotoUpdate) {
        if let Some(description) = &update.description {
            self.photo.description = description.clone();
        }
        if let Some(captured_at) = update.captured_at {
            self.photo.captured_at = captured_at;
        }
    }
}

/// Mutable fields of a record; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUpdate {
    pub description: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl PhotoUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.captured_at.is_none()
    }
}
