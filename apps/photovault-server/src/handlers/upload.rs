//! Batch upload handler

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use photovault_domain::{CorrelationId, FailureResult, ImageSource, UploadItem};
use photovault_fs::RemoteSource;
use tracing::{debug, error, info, warn};

use crate::{
    dto::photos::{
        CommitFailureResponse, ErrorResponse, UploadFailure, UploadForm, UploadMetadata,
        UploadResponse,
    },
    source::MultipartSource,
    AppState,
};

const METADATA_FIELD: &str = "metadata";
const FILE_FIELD_PREFIX: &str = "file_";

/// Upload a batch of photos
#[utoipa::path(
    post,
    path = "/photos",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Batch processed; listed uploads failed", body = UploadResponse),
        (status = 400, description = "Malformed form", body = ErrorResponse),
        (status = 500, description = "Batch could not be committed", body = CommitFailureResponse)
    ),
    tag = "photos"
)]
pub async fn upload_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let (entries, files) = match read_form(multipart).await {
        Ok(form) => form,
        Err((status, message)) => {
            warn!(error = %message, "Rejected upload form");
            return (status, Json(ErrorResponse { error: message })).into_response();
        }
    };
    info!(entries = entries.len(), files = files.len(), "Received upload batch");

    let (items, mut failures) = match build_items(entries, files) {
        Ok(built) => built,
        Err((status, message)) => {
            warn!(error = %message, "Rejected upload form");
            return (status, Json(ErrorResponse { error: message })).into_response();
        }
    };

    match state.ingestion.ingest(items).await {
        Ok(item_failures) => {
            failures.extend(item_failures);
            failures.sort_by_key(|f| f.correlation_id);
            info!(failed = failures.len(), "Upload batch processed");
            Json(UploadResponse {
                failures: failures.into_iter().map(UploadFailure::from).collect(),
            })
            .into_response()
        }
        Err(mut err) => {
            error!(error = %err, "Upload batch not committed");
            err.failures.extend(failures);
            err.failures.sort_by_key(|f| f.correlation_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CommitFailureResponse::from(err)),
            )
                .into_response()
        }
    }
}

type FormError = (StatusCode, String);

async fn read_form(
    mut multipart: Multipart,
) -> Result<(Vec<UploadMetadata>, HashMap<u64, MultipartSource>), FormError> {
    let mut entries = None;
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == METADATA_FIELD {
            let raw = field.text().await.map_err(|e| (e.status(), e.body_text()))?;
            let parsed: Vec<UploadMetadata> = serde_json::from_str(&raw).map_err(|e| {
                (StatusCode::BAD_REQUEST, format!("invalid metadata: {}", e))
            })?;
            entries = Some(parsed);
        } else if let Some(id) = name.strip_prefix(FILE_FIELD_PREFIX) {
            let id: u64 = id.parse().map_err(|_| {
                (StatusCode::BAD_REQUEST, format!("invalid file field name '{}'", name))
            })?;
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await.map_err(|e| (e.status(), e.body_text()))?;
            let source = MultipartSource::new(&name, file_name.as_deref(), data);
            debug!(upload_id = id, size = source.len(), "File part received");
            files.insert(id, source);
        } else {
            debug!(field = %name, "Ignoring unknown form field");
        }
    }

    let entries = entries.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("missing '{}' field", METADATA_FIELD),
        )
    })?;
    Ok((entries, files))
}

/// Pair metadata entries with their file parts
///
/// Entries that cannot form an item are reported as failures right away.
/// A repeated upload id makes the whole form malformed, since its failure
/// could not be told apart from the first entry's outcome.
fn build_items(
    entries: Vec<UploadMetadata>,
    mut files: HashMap<u64, MultipartSource>,
) -> Result<(Vec<UploadItem>, Vec<FailureResult>), FormError> {
    let mut seen = HashSet::new();
    if let Some(repeated) = entries.iter().find(|e| !seen.insert(e.upload_id)) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("duplicate uploadId {} in metadata", repeated.upload_id),
        ));
    }

    let mut items = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();

    for entry in entries {
        let id = CorrelationId::new(entry.upload_id);

        let source: Box<dyn ImageSource> = match (files.remove(&entry.upload_id), entry.uri) {
            (Some(file), _) => Box::new(file),
            (None, Some(uri)) if !uri.is_empty() => Box::new(RemoteSource::new(uri)),
            (None, _) => {
                failures.push(FailureResult::new(id, "uri is required when no file is sent"));
                continue;
            }
        };

        let mut item = UploadItem::new(id, source).with_description(entry.desc);
        if let Some(date) = entry.photo_date {
            item = item.with_captured_at(date);
        }
        items.push(item);
    }

    for id in files.keys() {
        warn!(upload_id = id, "File part without metadata entry ignored");
    }
    Ok((items, failures))
}
