//! SQLite photo catalog
//!
//! Records live in one `photos` table. `content_hash` carries a `UNIQUE`
//! constraint, so hash uniqueness holds at the row level whatever the
//! caller checked before. `bulk_create` inserts inside one transaction.

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use photovault_domain::photo::PhotoUpdate;
use photovault_domain::{
    ContentHash, ImageFormat, NewPhoto, PhotoId, PhotoRecord, PhotoRepository, Result, VaultError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info, instrument};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

const PHOTO_COLUMNS: &str =
    "id, description, format, uri, content_hash, size, width, height, captured_at";

#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: i64,
    description: String,
    format: String,
    uri: String,
    content_hash: String,
    size: i64,
    width: i64,
    height: i64,
    captured_at: DateTime<Utc>,
}

impl TryFrom<PhotoRow> for PhotoRecord {
    type Error = VaultError;

    fn try_from(row: PhotoRow) -> Result<Self> {
        let format = match row.format.as_str() {
            "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            other => {
                return Err(VaultError::repository(format!(
                    "photo {} has unknown format '{}'",
                    row.id, other
                )))
            }
        };
        let corrupt = |column: &str| {
            VaultError::repository(format!("photo {} has an invalid {}", row.id, column))
        };

        Ok(PhotoRecord::new(
            PhotoId::new(u64::try_from(row.id).map_err(|_| corrupt("id"))?),
            NewPhoto {
                description: row.description,
                format,
                uri: row.uri,
                content_hash: ContentHash::from_hex(row.content_hash),
                size: u64::try_from(row.size).map_err(|_| corrupt("size"))?,
                width: u32::try_from(row.width).map_err(|_| corrupt("width"))?,
                height: u32::try_from(row.height).map_err(|_| corrupt("height"))?,
                captured_at: row.captured_at,
            },
        ))
    }
}

fn db_error(operation: &str, err: sqlx::Error) -> VaultError {
    error!(operation, error = %err, "Catalog query failed");
    VaultError::repository(format!("{}: {}", operation, err))
}

/// Ids beyond `i64::MAX` cannot exist in the table
fn row_id(id: PhotoId) -> Option<i64> {
    i64::try_from(id.as_u64()).ok()
}

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path` and apply migrations
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Repository` when the file cannot be opened or is
    /// not a database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| db_error(&format!("open catalog {}", path.display()), e))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| {
                error!(path = %path.display(), error = %e, "Catalog migration failed");
                VaultError::repository(format!("migrate catalog {}: {}", path.display(), e))
            })?;

        info!(path = %path.display(), "Catalog opened");
        Ok(Self { pool })
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Catalog closed");
    }
}

impl PhotoRepository for SqliteCatalog {
    fn find_by_id(&self, id: PhotoId) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async move {
            let Some(row_id) = row_id(id) else {
                return Ok(None);
            };
            let row: Option<PhotoRow> =
                sqlx::query_as(&format!("SELECT {} FROM photos WHERE id = ?", PHOTO_COLUMNS))
                    .bind(row_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("find photo", e))?;
            row.map(PhotoRecord::try_from).transpose()
        }
    }

    fn exists_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> impl Future<Output = Result<bool>> + Send {
        let hash = hash.as_str().to_string();
        async move {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM photos WHERE content_hash = ?)",
            )
            .bind(hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("look up content hash", e))
        }
    }

    #[instrument(skip(self), fields(photo_id = %id))]
    fn delete_by_id(
        &self,
        id: PhotoId,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async move {
            let Some(row_id) = row_id(id) else {
                return Ok(None);
            };
            let row: Option<PhotoRow> = sqlx::query_as(&format!(
                "DELETE FROM photos WHERE id = ? RETURNING {}",
                PHOTO_COLUMNS
            ))
            .bind(row_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("delete photo", e))?;
            row.map(PhotoRecord::try_from).transpose()
        }
    }

    #[instrument(skip(self, photos), fields(count = photos.len()))]
    fn bulk_create(
        &self,
        photos: Vec<NewPhoto>,
    ) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("begin bulk insert", e))?;

            let mut created = Vec::with_capacity(photos.len());
            for photo in photos {
                let size = i64::try_from(photo.size).map_err(|_| {
                    VaultError::repository(format!("photo size {} out of range", photo.size))
                })?;
                let inserted = sqlx::query(
                    "INSERT INTO photos \
                     (description, format, uri, content_hash, size, width, height, captured_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&photo.description)
                .bind(photo.format.as_str())
                .bind(&photo.uri)
                .bind(photo.content_hash.as_str())
                .bind(size)
                .bind(i64::from(photo.width))
                .bind(i64::from(photo.height))
                .bind(photo.captured_at)
                .execute(&mut *tx)
                .await;

                let inserted = match inserted {
                    Ok(inserted) => inserted,
                    Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                        return Err(VaultError::repository(format!(
                            "content hash {} is already catalogued",
                            photo.content_hash
                        )));
                    }
                    Err(e) => return Err(db_error("insert photo", e)),
                };

                let id = u64::try_from(inserted.last_insert_rowid())
                    .map_err(|_| VaultError::repository("negative photo id assigned"))?;
                created.push(PhotoRecord::new(PhotoId::new(id), photo));
            }

            // Dropping `tx` on an early return rolls the whole batch back.
            tx.commit()
                .await
                .map_err(|e| db_error("commit bulk insert", e))?;

            info!(created = created.len(), "Photos catalogued");
            Ok(created)
        }
    }

    #[instrument(skip(self, update), fields(photo_id = %id))]
    fn update_by_id(
        &self,
        id: PhotoId,
        update: PhotoUpdate,
    ) -> impl Future<Output = Result<Option<PhotoRecord>>> + Send {
        async move {
            let Some(row_id) = row_id(id) else {
                return Ok(None);
            };
            let row: Option<PhotoRow> = sqlx::query_as(&format!(
                "UPDATE photos SET \
                 description = COALESCE(?, description), \
                 captured_at = COALESCE(?, captured_at) \
                 WHERE id = ? RETURNING {}",
                PHOTO_COLUMNS
            ))
            .bind(update.description)
            .bind(update.captured_at)
            .bind(row_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("update photo", e))?;
            row.map(PhotoRecord::try_from).transpose()
        }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<PhotoRecord>>> + Send {
        async move {
            let rows: Vec<PhotoRow> =
                sqlx::query_as(&format!("SELECT {} FROM photos ORDER BY id", PHOTO_COLUMNS))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| db_error("list photos", e))?;
            rows.into_iter().map(PhotoRecord::try_from).collect()
        }
    }
}
