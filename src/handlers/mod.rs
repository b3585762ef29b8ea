use crate::batch::{BatchCoordinator, BatchResult, ItemOutcome};
use crate::config::{Config, RouteLimits};
use crate::engines::{
    load_document, BlankPageRasterizer, DocumentError, IconPacker, ImageCodec, ImageEngine,
    PageRasterizer, PdfBuilder,
};
use crate::error::{AppError, Result, ValidationError};
use crate::formats::{CONVERT_FORMATS, PAGE_FORMATS};
use crate::request::RawForm;
use crate::response::{attachment, ConvertResponse, PagesResponse, PdfResponse};
use crate::transforms::assemble::{
    document_name, PageAccumulator, PdfPageTransform, ORIENTATIONS, PAGE_SIZES,
};
use crate::transforms::convert::ConvertTransform;
use crate::transforms::edit::{EditOptions, EditTransform};
use crate::transforms::icon::{IconTransform, ICON_SIZES};
use crate::transforms::rasterize::{plan_pages, RasterTransform};
use crate::validate::{self, Validated};
use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub struct AppState {
    pub config: Config,
    pub codec: Arc<dyn ImageCodec>,
    pub icons: Arc<dyn IconPacker>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub coordinator: BatchCoordinator,
}

impl AppState {
    /// State backed by the built-in engines.
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(ImageEngine::new());
        Self {
            coordinator: BatchCoordinator::new(config.batch_concurrency),
            codec: engine.clone(),
            icons: engine,
            rasterizer: Arc::new(BlankPageRasterizer),
            config,
        }
    }
}

/// Run a whole request under the route's wall-clock bound, inside a span
/// tagged with a fresh request id.
async fn bounded<T, F>(route: &'static str, limits: &RouteLimits, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let span = info_span!("request", route, request_id = %Uuid::new_v4());
    tokio::time::timeout(limits.max_duration, work.instrument(span))
        .await
        .map_err(|_| AppError::Timeout(limits.max_duration.as_secs()))?
}

/// The artifact of a single-file batch.
fn only_artifact<T>(result: BatchResult<T>) -> Result<T> {
    result
        .into_outcomes()
        .into_iter()
        .find_map(|outcome| match outcome {
            ItemOutcome::Success { artifact, .. } => Some(artifact),
            ItemOutcome::Failure { .. } => None,
        })
        .ok_or_else(|| AppError::Internal("batch succeeded without an artifact".to_string()))
}

/// Batch format conversion
pub async fn convert_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>> {
    let limits = state.config.convert;
    bounded("convert", &limits, async {
        let form = RawForm::from_multipart(multipart).await?;
        let Validated { files, options } = validate::convert(form, &limits)?;
        info!(files = files.len(), format = %options.format, "converting images");

        let transform = ConvertTransform::new(Arc::clone(&state.codec), options);
        let result = state
            .coordinator
            .run(files, &transform)
            .await
            .map_err(|e| e.into_app_error("files"))?;

        Ok(Json(ConvertResponse::from(result)))
    })
    .await
}

type EditValidator =
    fn(RawForm, &RouteLimits) -> std::result::Result<Validated<EditOptions>, ValidationError>;

async fn edit_route(
    state: &AppState,
    route: &'static str,
    multipart: Multipart,
    validator: EditValidator,
) -> Result<Response> {
    let limits = state.config.edit;
    bounded(route, &limits, async {
        let form = RawForm::from_multipart(multipart).await?;
        let Validated { files, options } = validator(form, &limits)?;
        info!(operation = ?options.operation, quality = options.quality.value(), "editing image");

        let transform = EditTransform::new(Arc::clone(&state.codec), options);
        let result = state
            .coordinator
            .run(files, &transform)
            .await
            .map_err(|e| e.into_app_error("images"))?;

        let image = only_artifact(result)?;
        Ok(attachment(
            image.format.mime().essence_str(),
            &image.filename,
            image.bytes,
        ))
    })
    .await
}

pub async fn compress_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    edit_route(&state, "compress", multipart, validate::compress).await
}

pub async fn resize_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    edit_route(&state, "resize", multipart, validate::resize).await
}

pub async fn crop_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    edit_route(&state, "crop", multipart, validate::crop).await
}

pub async fn rotate_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    edit_route(&state, "rotate", multipart, validate::rotate).await
}

/// Merge images into one PDF, one page each
pub async fn img_to_pdf_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PdfResponse>> {
    let limits = state.config.image_to_pdf;
    bounded("img-to-pdf", &limits, async {
        let form = RawForm::from_multipart(multipart).await?;
        let Validated {
            files,
            options: layout,
        } = validate::image_to_pdf(form, &limits)?;
        let name = document_name(&files, chrono::Utc::now().date_naive());
        info!(files = files.len(), page_size = ?layout.page_size, "assembling pdf");

        let transform = PdfPageTransform::new(Arc::clone(&state.codec), layout);
        let mut pages = PageAccumulator::new(PdfBuilder::new(), layout);
        let result = state
            .coordinator
            .run_folded(files, &transform, &mut pages)
            .await
            .map_err(|e| e.into_app_error("images"))?;

        let pdf = pages.finish()?;
        Ok(Json(PdfResponse::new(name, &pdf, &result)))
    })
    .await
}

fn unreadable(err: DocumentError) -> ValidationError {
    match err {
        DocumentError::Load(reason) => ValidationError::UnreadableDocument(reason),
        other => ValidationError::UnreadableDocument(other.to_string()),
    }
}

/// Render selected PDF pages to images
pub async fn pdf_to_img_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PagesResponse>> {
    let limits = state.config.pdf_to_image;
    bounded("pdf-to-img", &limits, async {
        let form = RawForm::from_multipart(multipart).await?;
        let Validated { files, options } = validate::pdf_to_image(form, &limits)?;
        let file = files.into_iter().next().ok_or(ValidationError::NoFiles)?;

        let content = file.content.clone();
        let document = tokio::task::spawn_blocking(move || load_document(&content))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(unreadable)?;

        let jobs = plan_pages(&document, &options.page_range, state.config.max_pdf_pages)?;
        info!(
            pages = document.page_count,
            selected = jobs.len(),
            dpi = options.dpi,
            "rasterizing pdf"
        );

        let transform = RasterTransform::new(
            Arc::clone(&state.rasterizer),
            Arc::clone(&state.codec),
            options,
        );
        let result = state
            .coordinator
            .run(jobs, &transform)
            .await
            .map_err(|e| e.into_app_error("pages"))?;

        Ok(Json(PagesResponse::new(result, document.page_count, file.name)))
    })
    .await
}

/// Pack an image into a multi-size ICO
pub async fn ico_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response> {
    let limits = state.config.icon;
    bounded("ico", &limits, async {
        let form = RawForm::from_multipart(multipart).await?;
        let Validated { files, options } = validate::icon(form, &limits)?;
        info!(sizes = ?options.sizes, "building icon");

        let transform = IconTransform::new(
            Arc::clone(&state.codec),
            Arc::clone(&state.icons),
            options,
        );
        let result = state
            .coordinator
            .run(files, &transform)
            .await
            .map_err(|e| e.into_app_error("images"))?;

        let icon = only_artifact(result)?;
        Ok(attachment("image/x-icon", &icon.filename, icon.bytes))
    })
    .await
}

pub async fn convert_capabilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limits = state.config.convert;
    Json(json!({
        "message": "Image Converter API",
        "version": env!("CARGO_PKG_VERSION"),
        "maxFileSize": format!("{}MB", limits.max_file_size_mb()),
        "maxFiles": limits.max_files,
        "supportedFormats": CONVERT_FORMATS,
    }))
}

pub async fn img_to_pdf_capabilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limits = state.config.image_to_pdf;
    Json(json!({
        "message": "Image to PDF Converter API",
        "version": env!("CARGO_PKG_VERSION"),
        "maxFileSize": format!("{}MB", limits.max_file_size_mb()),
        "maxFiles": limits.max_files,
        "features": {
            "pageSizes": PAGE_SIZES,
            "orientations": ORIENTATIONS,
            "quality": "1-100 (default: 85)",
            "margin": "0-49%",
        },
    }))
}

pub async fn pdf_to_img_capabilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limits = state.config.pdf_to_image;
    Json(json!({
        "message": "PDF to Image Converter API",
        "version": env!("CARGO_PKG_VERSION"),
        "maxFileSize": format!("{}MB", limits.max_file_size_mb()),
        "maxPages": state.config.max_pdf_pages,
        "supportedFormats": PAGE_FORMATS,
        "dpi": "1-600 (default: 150)",
    }))
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "pixmill"
    }))
}

/// Information endpoint - lists routes and input formats
pub async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let upload = |limits: RouteLimits| {
        json!({
            "maxFiles": limits.max_files,
            "maxFileSizeMb": limits.max_file_size_mb(),
            "timeoutSecs": limits.max_duration.as_secs(),
        })
    };
    let config = &state.config;

    Json(json!({
        "service": "pixmill",
        "version": env!("CARGO_PKG_VERSION"),
        "input_formats": ImageEngine::new().supported_extensions(),
        "batch_concurrency": state.coordinator.concurrency(),
        "endpoints": {
            "convert": {
                "path": "/api/convert",
                "method": "POST",
                "description": "Convert a batch of images to png, jpg, webp, avif or tiff.",
                "fields": {
                    "files": "Images to convert (required, repeatable)",
                    "format": "Target format (required)",
                    "quality": "1-100 (optional, default 80)",
                    "width": "Maximum width in pixels (optional)",
                    "height": "Maximum height in pixels (optional)"
                },
                "limits": upload(config.convert)
            },
            "compress": {
                "path": "/api/compress",
                "method": "POST",
                "description": "Re-encode one image as JPEG.",
                "fields": { "file": "required", "quality": "1-100 (optional, default 60)" },
                "limits": upload(config.edit)
            },
            "resize": {
                "path": "/api/resize",
                "method": "POST",
                "description": "Resize one image.",
                "fields": {
                    "file": "required",
                    "width": "required",
                    "height": "required",
                    "keepAspectRatio": "'true' to fit inside the box without enlarging",
                    "quality": "1-100 (optional, default 80)"
                },
                "limits": upload(config.edit)
            },
            "crop": {
                "path": "/api/crop",
                "method": "POST",
                "description": "Cut a rectangle out of one image.",
                "fields": {
                    "file": "required",
                    "x": "optional, default 0",
                    "y": "optional, default 0",
                    "width": "required",
                    "height": "required",
                    "quality": "1-100 (optional, default 80)"
                },
                "limits": upload(config.edit)
            },
            "rotate": {
                "path": "/api/rotate",
                "method": "POST",
                "description": "Rotate one image clockwise.",
                "fields": { "file": "required", "angle": "degrees (optional, default 0)", "quality": "1-100 (optional, default 80)" },
                "limits": upload(config.edit)
            },
            "img-to-pdf": {
                "path": "/api/img-to-pdf",
                "method": "POST",
                "description": "Merge images into one PDF, one page per image.",
                "fields": {
                    "files": "Images (required, repeatable)",
                    "pageSize": PAGE_SIZES,
                    "orientation": ORIENTATIONS,
                    "quality": "1-100 (optional, default 85)",
                    "margin": "0-49 percent (optional, default 0)"
                },
                "limits": upload(config.image_to_pdf)
            },
            "pdf-to-img": {
                "path": "/api/pdf-to-img",
                "method": "POST",
                "description": "Render PDF pages to images.",
                "fields": {
                    "file": "PDF (required)",
                    "format": PAGE_FORMATS,
                    "quality": "1-100 (optional, default 85)",
                    "dpi": "1-600 (optional, default 150)",
                    "pageRange": "'all' or e.g. '1,3,5-7' (optional, default all)"
                },
                "limits": upload(config.pdf_to_image)
            },
            "ico": {
                "path": "/api/ico",
                "method": "POST",
                "description": "Build a multi-size ICO from one image.",
                "fields": { "file": "required", "sizes": format!("JSON array drawn from {:?}", ICON_SIZES) },
                "limits": upload(config.icon)
            },
            "health": {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            }
        }
    }))
}
