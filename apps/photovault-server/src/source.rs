//! Image source backed by a multipart file field

use std::io::{Cursor, Read};

use bytes::Bytes;
use photovault_domain::{ImageSource, Result};

/// File part of a multipart upload, buffered while the form is parsed
///
/// The display name is the part's file name, or the field name when the
/// client sent none.
pub struct MultipartSource {
    name: String,
    data: Bytes,
}

impl MultipartSource {
    pub fn new(field_name: &str, file_name: Option<&str>, data: Bytes) -> Self {
        let name = file_name
            .filter(|n| !n.is_empty())
            .unwrap_or(field_name)
            .to_string();
        Self { name, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ImageSource for MultipartSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data)))
    }
}
