//! Storage addresses
//!
//! A storage address is the logical URI persisted with a photo record, e.g.
//! `local://202401/05/13/20240105130405_0190d7...`. It resolves against the
//! files root into the paths of the original and compressed variants:
//!
//! ```text
//! <root>/202401/05/13/20240105130405_<id>_original
//! <root>/202401/05/13/20240105130405_<id>_compressed
//! ```
//!
//! Remote addresses (`ftp://`, `scp://`) embed the base64 of the remote
//! original's URI after the timestamp. Only their compressed variant is
//! stored locally.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Local, TimeZone};
use photovault_domain::{Result, VaultError};
use tracing::debug;
use uuid::Uuid;

const ORIGINAL_SUFFIX: &str = "_original";
const COMPRESSED_SUFFIX: &str = "_compressed";

/// Storage scheme of an address, resolved once at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Local,
    Ftp,
    Scp,
}

impl Scheme {
    const ALL: [Scheme; 3] = [Scheme::Local, Scheme::Ftp, Scheme::Scp];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Local => "local://",
            Self::Ftp => "ftp://",
            Self::Scp => "scp://",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local)
    }

    /// Split a uri into its scheme and the remainder after the prefix
    pub fn split(uri: &str) -> Option<(Scheme, &str)> {
        Self::ALL
            .iter()
            .find_map(|scheme| uri.strip_prefix(scheme.prefix()).map(|rest| (*scheme, rest)))
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches("://"))
    }
}

/// Where the original bytes of an image live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalLocation<'a> {
    /// A file under the files root
    File(PathBuf),
    /// A remote URI this store does not own
    Remote(&'a str),
}

/// Immutable, scheme-tagged locator of an image's variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAddress {
    scheme: Scheme,
    root: PathBuf,
    relative: String,
    remote_original: Option<String>,
}

impl StorageAddress {
    /// Parse a persisted or caller-supplied uri
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidUri` when the prefix is not one of
    /// `local://`, `ftp://`, `scp://`, when the path is empty or escapes the
    /// root, or when a remote address carries no decodable original uri.
    pub fn parse(root: impl Into<PathBuf>, uri: &str) -> Result<Self> {
        let (scheme, rest) =
            Scheme::split(uri).ok_or_else(|| VaultError::invalid_uri(uri, "unrecognized scheme"))?;

        let relative = rest.trim_start_matches('/');
        if relative.is_empty() {
            return Err(VaultError::invalid_uri(uri, "empty path"));
        }
        if relative.split('/').any(|part| part == ".." || part == ".") {
            return Err(VaultError::invalid_uri(uri, "path escapes the files root"));
        }

        let remote_original = if scheme.is_remote() {
            Some(decode_remote(uri, scheme, relative)?)
        } else {
            None
        };

        Ok(Self {
            scheme,
            root: root.into(),
            relative: relative.to_string(),
            remote_original,
        })
    }

    /// Allocate a fresh local address bucketed by the current local time
    pub fn create(root: impl Into<PathBuf>) -> Self {
        Self::create_at(root, Local::now())
    }

    /// Allocate a fresh local address bucketed by `at`
    pub fn create_at<Tz>(root: impl Into<PathBuf>, at: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let id = Uuid::now_v7().simple().to_string();
        Self {
            scheme: Scheme::Local,
            root: root.into(),
            relative: bucketed(&at, &id),
            remote_original: None,
        }
    }

    /// Allocate an address for an original living at a remote uri
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidUri` unless `remote_uri` is `ftp://` or `scp://`
    pub fn create_remote(root: impl Into<PathBuf>, remote_uri: &str) -> Result<Self> {
        Self::create_remote_at(root, remote_uri, Local::now())
    }

    pub fn create_remote_at<Tz>(
        root: impl Into<PathBuf>,
        remote_uri: &str,
        at: DateTime<Tz>,
    ) -> Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let scheme = match Scheme::split(remote_uri) {
            Some((scheme, _)) if scheme.is_remote() => scheme,
            _ => return Err(VaultError::invalid_uri(remote_uri, "not a remote uri")),
        };
        let encoded = URL_SAFE_NO_PAD.encode(remote_uri.as_bytes());

        Ok(Self {
            scheme,
            root: root.into(),
            relative: bucketed(&at, &encoded),
            remote_original: Some(remote_uri.to_string()),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_local(&self) -> bool {
        self.scheme == Scheme::Local
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the files root, `/`-separated
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// Base path the variant suffixes are appended to
    pub fn base_path(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    /// Location of the original bytes
    pub fn original(&self) -> OriginalLocation<'_> {
        match &self.remote_original {
            Some(uri) => OriginalLocation::Remote(uri),
            None => OriginalLocation::File(self.suffixed(ORIGINAL_SUFFIX)),
        }
    }

    /// Local path of the original, `None` for remote addresses
    pub fn original_path(&self) -> Option<PathBuf> {
        match self.original() {
            OriginalLocation::File(path) => Some(path),
            OriginalLocation::Remote(_) => None,
        }
    }

    /// Local path of the compressed variant, for every scheme
    pub fn compressed_path(&self) -> PathBuf {
        self.suffixed(COMPRESSED_SUFFIX)
    }

    /// Create the directory holding the variants
    ///
    /// Blocking; async callers run it on the blocking pool.
    pub fn ensure_directory(&self) -> Result<()> {
        let base = self.base_path();
        let Some(dir) = base.parent() else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)
            .map_err(|e| VaultError::io(format!("create directory {}", dir.display()), e))?;
        debug!(dir = %dir.display(), "Storage directory ready");
        Ok(())
    }

    fn suffixed(&self, suffix: &str) -> PathBuf {
        let mut path = self.base_path().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scheme.prefix(), self.relative)
    }
}

fn bucketed<Tz>(at: &DateTime<Tz>, name: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}/{}_{}",
        at.format("%Y%m/%d/%H"),
        at.format("%Y%m%d%H%M%S"),
        name
    )
}

fn decode_remote(uri: &str, scheme: Scheme, relative: &str) -> Result<String> {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    let (_, encoded) = file_name
        .split_once('_')
        .ok_or_else(|| VaultError::invalid_uri(uri, "missing embedded remote uri"))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| VaultError::invalid_uri(uri, "embedded remote uri is not valid base64"))?;

    if !decoded.starts_with(scheme.prefix()) {
        return Err(VaultError::invalid_uri(
            uri,
            format!("embedded uri '{}' does not match scheme {}", decoded, scheme),
        ));
    }
    Ok(decoded)
}
