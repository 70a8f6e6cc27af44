//! API routes

pub mod photos;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dto::photos::{
        CommitFailureResponse, ErrorResponse, PhotoResponse, UpdatePhotoRequest, UploadFailure,
        UploadForm, UploadMetadata, UploadResponse,
    },
    handlers, AppState,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload_handler,
        handlers::photos::list_handler,
        handlers::photos::get_handler,
        handlers::photos::update_handler,
        handlers::photos::delete_handler,
        handlers::photos::original_handler,
        handlers::photos::download_handler,
        handlers::photos::compressed_handler,
        health_handler
    ),
    components(
        schemas(
            UploadForm,
            UploadMetadata,
            UploadFailure,
            UploadResponse,
            CommitFailureResponse,
            PhotoResponse,
            UpdatePhotoRequest,
            ErrorResponse
        )
    ),
    tags(
        (name = "photos", description = "Photo upload and catalog endpoints"),
        (name = "images", description = "Original and preview image endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "photovault API",
        version = "0.1.0",
        description = "Photo archive: batch upload, previews, downloads"
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(photos::routes())
        .route("/health", axum::routing::get(health_handler))
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    ),
    tag = "health"
)]
async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_photo_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/photos", "/photos/{id}", "/photos/{id}/compressed", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "{}", path);
        }
    }
}
