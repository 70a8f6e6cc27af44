//! HTTP handlers

pub mod photos;
pub mod upload;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use photovault_domain::VaultError;
use tracing::{error, warn};

use crate::dto::photos::ErrorResponse;

/// Status code for a domain error
pub fn error_status(err: &VaultError) -> StatusCode {
    match err {
        VaultError::InvalidUri { .. } => StatusCode::BAD_REQUEST,
        VaultError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        VaultError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VaultError::DuplicateContent { .. } | VaultError::AlreadyExists(_) => StatusCode::CONFLICT,
        VaultError::NotFound(_) => StatusCode::NOT_FOUND,
        VaultError::RemoteUnsupported(_) => StatusCode::NOT_IMPLEMENTED,
        VaultError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        VaultError::Io { .. }
        | VaultError::Compression(_)
        | VaultError::Repository(_)
        | VaultError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error response for a domain error
pub fn error_response(err: VaultError) -> Response {
    let status = error_status(&err);
    if status.is_server_error() {
        error!(error = ?err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(&VaultError::NotFound("photo 1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&VaultError::AlreadyExists("ab".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(&VaultError::invalid_uri("x", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&VaultError::repository("locked")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
