//! Image processor
//!
//! Wraps one `ImageSource` and derives everything the pipeline needs from
//! its bytes. The payload, the content hash and the decoded metadata are
//! each computed at most once per processor.
//!
//! All methods are blocking (decode and encode are CPU bound); async callers
//! run them on the blocking pool.

use std::io::{Cursor, Read};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;
use photovault_domain::{ContentHash, ImageFormat, ImageMetadata, ImageSource, Result, VaultError};
use tracing::{debug, warn};

/// JPEG quality of the preview rendition
pub const JPEG_PREVIEW_QUALITY: u8 = 30;

/// Output of [`ImageProcessor::compress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compressed {
    /// A smaller re-encoded rendition
    Reencoded(Bytes),
    /// The original bytes, returned as-is because the format has no
    /// compression step yet
    Passthrough(Bytes),
}

impl Compressed {
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Reencoded(bytes) | Self::Passthrough(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Reencoded(bytes) | Self::Passthrough(bytes) => bytes,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }
}

pub struct ImageProcessor {
    name: String,
    source: Option<Box<dyn ImageSource>>,
    data: Option<Bytes>,
    hash: Option<ContentHash>,
    metadata: Option<ImageMetadata>,
    #[cfg(test)]
    decodes: usize,
}

impl ImageProcessor {
    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            name: source.name().to_string(),
            source: Some(source),
            data: None,
            hash: None,
            metadata: None,
            #[cfg(test)]
            decodes: 0,
        }
    }

    /// Display name of the source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw payload, read from the source on first access
    ///
    /// # Errors
    ///
    /// Returns the source's open error or `VaultError::Io` when reading fails
    pub fn data(&mut self) -> Result<Bytes> {
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        let source = self
            .source
            .take()
            .ok_or_else(|| VaultError::internal(format!("source '{}' already consumed", self.name)))?;

        let mut reader = source.open()?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| VaultError::io(format!("read source '{}'", self.name), e))?;

        debug!(name = %self.name, size = buf.len(), "Source read");
        let data = Bytes::from(buf);
        self.data = Some(data.clone());
        Ok(data)
    }

    /// BLAKE3 digest of the raw payload, lowercase hex
    pub fn content_hash(&mut self) -> Result<ContentHash> {
        if let Some(hash) = &self.hash {
            return Ok(hash.clone());
        }
        let data = self.data()?;
        let hash = ContentHash::from_hex(blake3::hash(&data).to_hex().as_str());
        self.hash = Some(hash.clone());
        Ok(hash)
    }

    /// Container format and pixel dimensions
    ///
    /// # Errors
    ///
    /// Returns `VaultError::UnsupportedFormat` for anything but JPEG and PNG,
    /// `VaultError::Decode` when the header cannot be read.
    pub fn metadata(&mut self) -> Result<ImageMetadata> {
        if let Some(metadata) = &self.metadata {
            return Ok(metadata.clone());
        }
        let content_hash = self.content_hash()?;
        let data = self.data()?;

        #[cfg(test)]
        {
            self.decodes += 1;
        }

        let reader = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| VaultError::io(format!("inspect '{}'", self.name), e))?;
        let format = match reader.format() {
            Some(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
            Some(image::ImageFormat::Png) => ImageFormat::Png,
            Some(other) => {
                return Err(VaultError::UnsupportedFormat(
                    other.extensions_str().first().copied().unwrap_or("unknown").to_string(),
                ))
            }
            None => return Err(VaultError::UnsupportedFormat("unknown".to_string())),
        };
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| VaultError::decode(format!("'{}': {}", self.name, e)))?;

        let metadata = ImageMetadata {
            content_hash,
            size: data.len() as u64,
            format,
            width,
            height,
        };
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    /// Produce the preview rendition
    ///
    /// JPEG is re-encoded at [`JPEG_PREVIEW_QUALITY`]. PNG has no compression
    /// step and comes back as [`Compressed::Passthrough`].
    pub fn compress(&mut self) -> Result<Compressed> {
        let metadata = self.metadata()?;
        let data = self.data()?;

        match metadata.format {
            ImageFormat::Jpeg => {
                let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
                    .map_err(|e| VaultError::decode(format!("'{}': {}", self.name, e)))?;
                let mut out = Vec::new();
                JpegEncoder::new_with_quality(&mut out, JPEG_PREVIEW_QUALITY)
                    .encode_image(&decoded.to_rgb8())
                    .map_err(|e| VaultError::Compression(format!("'{}': {}", self.name, e)))?;
                debug!(name = %self.name, original = data.len(), compressed = out.len(), "JPEG re-encoded");
                Ok(Compressed::Reencoded(Bytes::from(out)))
            }
            ImageFormat::Png => {
                warn!(name = %self.name, "PNG compression not implemented, keeping original bytes");
                Ok(Compressed::Passthrough(data))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn decode_count(&self) -> usize {
        self.decodes
    }
}
