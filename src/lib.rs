//! Batch image conversion service.
//!
//! Uploads are validated up front, converted item by item through a bounded
//! [`batch::BatchCoordinator`], and answered as JSON batches or single file
//! downloads.

pub mod batch;
pub mod config;
pub mod engines;
pub mod error;
pub mod formats;
pub mod geometry;
pub mod handlers;
pub mod request;
pub mod response;
pub mod transforms;
pub mod validate;

#[cfg(test)]
mod test_helpers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/convert",
            post(handlers::convert_handler).get(handlers::convert_capabilities),
        )
        .route("/compress", post(handlers::compress_handler))
        .route("/resize", post(handlers::resize_handler))
        .route("/crop", post(handlers::crop_handler))
        .route("/rotate", post(handlers::rotate_handler))
        .route(
            "/img-to-pdf",
            post(handlers::img_to_pdf_handler).get(handlers::img_to_pdf_capabilities),
        )
        .route(
            "/pdf-to-img",
            post(handlers::pdf_to_img_handler).get(handlers::pdf_to_img_capabilities),
        )
        .route("/ico", post(handlers::ico_handler));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health_handler))
        .route("/info", get(handlers::info_handler))
        .route("/", get(handlers::info_handler))
        .layer(DefaultBodyLimit::max(state.config.max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
