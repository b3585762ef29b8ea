use crate::engines::{CodecError, DocumentError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-shape problems, always reported before any item is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files provided")]
    NoFiles,

    #[error("Maximum {max} files allowed at once")]
    TooManyFiles { max: usize },

    #[error("Missing {0}")]
    MissingOption(&'static str),

    #[error("{field} {constraint}")]
    OutOfRange {
        field: &'static str,
        constraint: &'static str,
    },

    #[error("Invalid {field}: {reason}")]
    InvalidOption { field: &'static str, reason: String },

    #[error("File {name} exceeds {limit_mb}MB limit")]
    FileTooLarge { name: String, limit_mb: usize },

    #[error("File must be a PDF")]
    NotAPdf,

    #[error("Invalid PDF: {0}")]
    UnreadableDocument(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("PDF has {pages} pages. Maximum allowed is {max}")]
    TooManyPages { pages: usize, max: usize },

    #[error("No valid pages to convert")]
    NoValidPages,
}

/// Failure of a single item. Recorded in the batch result, never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Invalid image file: {0}")]
    CorruptInput(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("{0}")]
    Geometry(String),

    #[error("Failed to embed in PDF: {0}")]
    Embed(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<CodecError> for TransformError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedFormat => TransformError::UnsupportedFormat,
            CodecError::CorruptInput(detail) => TransformError::CorruptInput(detail),
            CodecError::Encode(detail) => TransformError::Encode(detail),
            CodecError::Geometry(detail) => TransformError::Geometry(detail),
        }
    }
}

impl From<DocumentError> for TransformError {
    fn from(err: DocumentError) -> Self {
        TransformError::Embed(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No {subject} could be converted ({first_failure})")]
    NoItemsConverted {
        subject: &'static str,
        first_failure: String,
    },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NoItemsConverted { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && !matches!(self, AppError::Timeout(_)) {
            tracing::error!(error = %self, "request failed");
            "Conversion failed. Please check your input and try again.".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        let err: AppError = ValidationError::TooManyFiles { max: 20 }.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Maximum 20 files allowed at once");
    }

    #[test]
    fn no_items_converted_names_first_failure() {
        let err = AppError::NoItemsConverted {
            subject: "files",
            first_failure: "a.png: Unsupported image format".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("No files could be converted"));
        assert!(err.to_string().contains("a.png"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal("lopdf exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        assert_eq!(AppError::Timeout(60).status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn codec_errors_translate_to_item_failures() {
        let err: TransformError = CodecError::CorruptInput("truncated".into()).into();
        assert_eq!(err.to_string(), "Invalid image file: truncated");
        let err: TransformError = CodecError::UnsupportedFormat.into();
        assert_eq!(err, TransformError::UnsupportedFormat);
    }
}
