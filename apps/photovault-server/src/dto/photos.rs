//! DTOs for photo endpoints

use chrono::{DateTime, Utc};
use photovault_domain::photo::PhotoUpdate;
use photovault_domain::{BatchCommitError, FailureResult, PhotoRecord};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of the `metadata` field of a batch upload
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Upload slot number; the file part is named `file_<uploadId>`
    #[schema(example = 1)]
    pub upload_id: u64,
    #[serde(default)]
    #[schema(example = "Summer holidays")]
    pub desc: String,
    #[serde(default)]
    pub photo_date: Option<DateTime<Utc>>,
    /// Remote original (`ftp://` or `scp://`) for entries sent without a file
    #[serde(default)]
    pub uri: Option<String>,
}

/// Multipart form of `POST /photos`, documentation only
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// JSON array of `UploadMetadata`
    pub metadata: String,
    /// File part; one per entry, named `file_<uploadId>`
    #[schema(value_type = String, format = Binary)]
    pub file_1: Vec<u8>,
}

/// A per-item upload failure
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    #[schema(example = 2)]
    pub upload_id: u64,
    #[schema(example = "Duplicate content: 'b.jpg' has the same content as 'a.jpg'")]
    pub message: String,
}

impl From<FailureResult> for UploadFailure {
    fn from(failure: FailureResult) -> Self {
        Self {
            upload_id: failure.correlation_id.as_u64(),
            message: failure.message,
        }
    }
}

/// Response of a batch upload; uploads not listed were stored
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub failures: Vec<UploadFailure>,
}

/// Response of a batch whose commit failed; nothing was stored
#[derive(Debug, Serialize, ToSchema)]
pub struct CommitFailureResponse {
    pub error: String,
    pub failures: Vec<UploadFailure>,
    /// Upload ids that were processed but not committed
    pub uncommitted: Vec<u64>,
}

impl From<BatchCommitError> for CommitFailureResponse {
    fn from(err: BatchCommitError) -> Self {
        Self {
            error: err.to_string(),
            uncommitted: err.uncommitted.iter().map(|id| id.as_u64()).collect(),
            failures: err.failures.into_iter().map(UploadFailure::from).collect(),
        }
    }
}

/// A stored photo
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    #[schema(example = 42)]
    pub id: u64,
    pub description: String,
    #[schema(example = "jpeg")]
    pub format: String,
    #[schema(example = "local://202401/05/13/20240105130405_0190d7c3a1b27c4e8f6d2a9b5e3c1f07")]
    pub uri: String,
    pub content_hash: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    #[schema(example = "4032x3024")]
    pub resolution: String,
    pub photo_date: DateTime<Utc>,
}

impl From<PhotoRecord> for PhotoResponse {
    fn from(record: PhotoRecord) -> Self {
        let resolution = record.photo.resolution();
        let photo = record.photo;
        Self {
            id: record.id.as_u64(),
            description: photo.description,
            format: photo.format.to_string(),
            uri: photo.uri,
            content_hash: photo.content_hash.to_string(),
            size: photo.size,
            width: photo.width,
            height: photo.height,
            resolution,
            photo_date: photo.captured_at,
        }
    }
}

/// Body of `PUT /photos/{id}`; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoRequest {
    pub desc: Option<String>,
    pub photo_date: Option<DateTime<Utc>>,
}

impl From<UpdatePhotoRequest> for PhotoUpdate {
    fn from(req: UpdatePhotoRequest) -> Self {
        Self {
            description: req.desc,
            captured_at: req.photo_date,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "photo 42 not found")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use photovault_domain::{CorrelationId, VaultError};

    #[test]
    fn test_metadata_parses_camel_case() {
        let raw = r#"[
            {"uploadId": 1, "desc": "beach", "photoDate": "2024-01-05T13:04:05Z"},
            {"uploadId": 2, "uri": "ftp://nas/a.jpg"}
        ]"#;

        let entries: Vec<UploadMetadata> = serde_json::from_str(raw).unwrap();

        assert_eq!(entries[0].upload_id, 1);
        assert!(entries[0].photo_date.is_some());
        assert_eq!(entries[1].desc, "");
        assert_eq!(entries[1].uri.as_deref(), Some("ftp://nas/a.jpg"));
    }

    #[test]
    fn test_commit_failure_response() {
        let err = BatchCommitError {
            failures: vec![FailureResult::new(CorrelationId::new(3), "decode step failed")],
            uncommitted: vec![CorrelationId::new(1), CorrelationId::new(2)],
            source: VaultError::repository("disk full"),
        };

        let response = CommitFailureResponse::from(err);

        assert_eq!(response.uncommitted, vec![1, 2]);
        assert_eq!(response.failures[0].upload_id, 3);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["failures"][0]["uploadId"], 3);
    }
}
