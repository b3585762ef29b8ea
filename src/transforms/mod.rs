//! Per-item transforms, one module per tool.
//!
//! Each transform owns its options record and a handle to the capability it
//! delegates to. Codec work is moved onto the blocking pool so the items of
//! one chunk really run side by side.

pub mod assemble;
pub mod convert;
pub mod edit;
pub mod icon;
pub mod rasterize;

use crate::error::TransformError;
use crate::formats::OutputFormat;

/// An encoded output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub filename: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Run CPU-bound work on the blocking pool.
async fn blocking<F, T>(work: F) -> Result<T, TransformError>
where
    F: FnOnce() -> Result<T, TransformError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TransformError::Worker(e.to_string()))?
}
