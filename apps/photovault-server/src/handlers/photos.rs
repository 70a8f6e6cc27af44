//! Photo record and image serving handlers

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use photovault_domain::{ImageFormat, PhotoId, PhotoRecord, VaultError};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::error_response;
use crate::{
    dto::photos::{ErrorResponse, PhotoResponse, UpdatePhotoRequest},
    AppState,
};

/// List all photos
#[utoipa::path(
    get,
    path = "/photos",
    responses(
        (status = 200, description = "All stored photos", body = [PhotoResponse]),
        (status = 500, description = "Catalog unavailable", body = ErrorResponse)
    ),
    tag = "photos"
)]
pub async fn list_handler(State(state): State<AppState>) -> Response {
    match state.photos.list().await {
        Ok(records) => {
            debug!(count = records.len(), "Listing photos");
            Json(records.into_iter().map(PhotoResponse::from).collect::<Vec<_>>()).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Get one photo record
#[utoipa::path(
    get,
    path = "/photos/{id}",
    params(("id" = u64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo found", body = PhotoResponse),
        (status = 404, description = "No such photo", body = ErrorResponse)
    ),
    tag = "photos"
)]
pub async fn get_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.photos.get(PhotoId::new(id)).await {
        Ok(record) => Json(PhotoResponse::from(record)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Update the description or date of a photo
#[utoipa::path(
    put,
    path = "/photos/{id}",
    params(("id" = u64, Path, description = "Photo id")),
    request_body = UpdatePhotoRequest,
    responses(
        (status = 200, description = "Photo updated", body = PhotoResponse),
        (status = 404, description = "No such photo", body = ErrorResponse)
    ),
    tag = "photos"
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdatePhotoRequest>,
) -> Response {
    match state.photos.update(PhotoId::new(id), payload.into()).await {
        Ok(record) => {
            info!(photo_id = id, "Photo updated");
            Json(PhotoResponse::from(record)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Delete a photo and its stored files
#[utoipa::path(
    delete,
    path = "/photos/{id}",
    params(("id" = u64, Path, description = "Photo id")),
    responses(
        (status = 204, description = "Photo deleted"),
        (status = 404, description = "No such photo", body = ErrorResponse)
    ),
    tag = "photos"
)]
pub async fn delete_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.photos.delete(PhotoId::new(id)).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

/// Stream the original image
#[utoipa::path(
    get,
    path = "/photos/{id}/original",
    params(("id" = u64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Original image bytes"),
        (status = 404, description = "No such photo", body = ErrorResponse),
        (status = 501, description = "Original lives on a remote host", body = ErrorResponse)
    ),
    tag = "images"
)]
pub async fn original_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match serve_original(&state, id, false).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

/// Download the original image as an attachment
#[utoipa::path(
    get,
    path = "/photos/{id}/download",
    params(("id" = u64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Original image as attachment"),
        (status = 404, description = "No such photo", body = ErrorResponse)
    ),
    tag = "images"
)]
pub async fn download_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match serve_original(&state, id, true).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

/// Serve the compressed preview
#[utoipa::path(
    get,
    path = "/photos/{id}/compressed",
    params(("id" = u64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Compressed preview bytes"),
        (status = 404, description = "No such photo", body = ErrorResponse)
    ),
    tag = "images"
)]
pub async fn compressed_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let result = async {
        let record = state.photos.get(PhotoId::new(id)).await?;
        let bytes = state.store.downloader(&record.photo.uri)?.compressed().await?;
        Ok::<_, VaultError>((record, bytes))
    }
    .await;

    match result {
        Ok((record, bytes)) => (
            [(header::CONTENT_TYPE, record.photo.format.mime_type())],
            bytes,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn serve_original(state: &AppState, id: u64, attachment: bool) -> Result<Response, VaultError> {
    let record = state.photos.get(PhotoId::new(id)).await?;
    let file = state
        .store
        .downloader(&record.photo.uri)?
        .open_original()
        .await?;

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(record.photo.format.mime_type()),
    );
    if attachment {
        if let Ok(value) = HeaderValue::from_str(&content_disposition(&record)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}

/// `attachment` disposition named after the photo id and format
fn content_disposition(record: &PhotoRecord) -> String {
    let extension = match record.photo.format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
    };
    format!("attachment; filename=\"photo-{}.{}\"", record.id, extension)
}
