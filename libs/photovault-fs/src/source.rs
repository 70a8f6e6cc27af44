//! Concrete image sources

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use bytes::Bytes;
use photovault_domain::{ImageSource, Result, VaultError};

/// Source over an in-memory buffer
pub struct MemorySource {
    name: String,
    data: Bytes,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ImageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data)))
    }
}

/// Source reading a file on disk; the display name defaults to the file name
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ImageSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path)
            .map_err(|e| VaultError::io(format!("open {}", self.path.display()), e))?;
        Ok(Box::new(file))
    }
}

/// Source for an original that lives at an `ftp://` or `scp://` uri
///
/// Remote transfer is not available, so opening always fails.
pub struct RemoteSource {
    name: String,
    uri: String,
}

impl RemoteSource {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let name = uri.rsplit('/').next().unwrap_or_default().to_string();
        Self { name, uri }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl ImageSource for RemoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn Read + Send>> {
        Err(VaultError::RemoteUnsupported(format!("cannot read {}", self.uri)))
    }
}
