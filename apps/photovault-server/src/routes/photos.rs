//! Photo routes

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{photos, upload::upload_handler},
    AppState,
};

/// Largest accepted upload form, all files included
pub const MAX_UPLOAD_BYTES: usize = 1 << 30;

/// Create photo routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/photos",
            post(upload_handler)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .get(photos::list_handler),
        )
        .route(
            "/photos/:id",
            get(photos::get_handler)
                .put(photos::update_handler)
                .delete(photos::delete_handler),
        )
        .route("/photos/:id/original", get(photos::original_handler))
        .route("/photos/:id/download", get(photos::download_handler))
        .route("/photos/:id/compressed", get(photos::compressed_handler))
}
