//! Server configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use photovault_domain::ingestion::BatchConfig;
use photovault_fs::CacheConfig;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub workers: usize,
    pub cache_max_cost: u64,
    pub batch_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Read `PHOTOVAULT_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("PHOTOVAULT_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse(&lookup, "PHOTOVAULT_PORT")?.unwrap_or(8080);
        let workers = parse(&lookup, "PHOTOVAULT_WORKERS")?.unwrap_or(8);
        if workers == 0 {
            return Err(anyhow!("PHOTOVAULT_WORKERS must be at least 1"));
        }
        let cache_max_cost = parse(&lookup, "PHOTOVAULT_CACHE_MAX_COST")?
            .unwrap_or(CacheConfig::default().max_cost);
        let batch_timeout =
            parse::<u64>(&lookup, "PHOTOVAULT_BATCH_TIMEOUT_SECS")?.map(Duration::from_secs);

        let data_dir = match lookup("PHOTOVAULT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(&lookup)?,
        };

        Ok(Self {
            host,
            port,
            data_dir,
            workers,
            cache_max_cost,
            batch_timeout,
        })
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("photos.db")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            workers: self.workers,
            deadline: self.batch_timeout,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_cost: self.cache_max_cost,
            ..CacheConfig::default()
        }
    }

    pub fn log_summary(&self) {
        info!(
            data_dir = %self.data_dir.display(),
            workers = self.workers,
            cache_max_cost = self.cache_max_cost,
            batch_timeout_secs = self.batch_timeout.map(|d| d.as_secs()),
            "Configuration loaded"
        );
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: '{}'", key, raw))
        })
        .transpose()
}

/// `$XDG_DATA_HOME/photos`, falling back to `$HOME/.local/share/photos`
fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(xdg) = lookup("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("photos"));
    }
    let home = lookup("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("neither PHOTOVAULT_DATA_DIR, XDG_DATA_HOME nor HOME is set"))?;
    Ok(PathBuf::from(home).join(".local/share/photos"))
}
