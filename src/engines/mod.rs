//! Capability boundary: everything that touches pixels or PDF objects.
//!
//! The rest of the crate only sees the traits below. [`ImageEngine`] backs
//! them with the `image` crate, [`PdfBuilder`] and [`load_document`] with
//! `lopdf`.

mod codec;
mod document;
mod raster;

pub use codec::ImageEngine;
pub use document::{load_document, LoadedDocument, PdfBuilder};
pub use raster::BlankPageRasterizer;

use crate::formats::{OutputFormat, Quality};
use ::image::{DynamicImage, ImageFormat, Rgba};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("{0}")]
    CorruptInput(String),
    #[error("{0}")]
    Encode(String),
    #[error("{0}")]
    Geometry(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unreadable document: {0}")]
    Load(String),
    #[error("invalid page: {0}")]
    Page(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// A decoded image together with the container format it was read from.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
}

/// Rectangle in pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A page size or position in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub width: f32,
    pub height: f32,
}

/// Where an image is drawn on its page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A JPEG ready to be embedded as a page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1 for grayscale, 3 for RGB.
    pub components: u8,
}

/// Decode, encode and pixel operations on single images.
pub trait ImageCodec: Send + Sync {
    /// Sniff and decode. Fails with `UnsupportedFormat` when the bytes are not
    /// a recognizable image, `CorruptInput` when decoding breaks.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError>;

    /// Encode to `format`. `quality` applies to lossy encoders only.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;

    /// Resize to exactly `width` x `height`.
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Scale to fit inside `width` x `height`, then centre on a canvas of
    /// exactly that size filled with `background`.
    fn contain(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        background: Rgba<u8>,
    ) -> DynamicImage;

    fn crop(&self, image: &DynamicImage, rect: CropRect) -> Result<DynamicImage, CodecError>;

    /// Rotate clockwise by `degrees`, expanding the canvas with black.
    fn rotate(&self, image: &DynamicImage, degrees: i32) -> DynamicImage;
}

/// Pack square RGBA images into an ICO container.
pub trait IconPacker: Send + Sync {
    fn pack_icon_set(&self, frames: &[DynamicImage]) -> Result<Vec<u8>, CodecError>;
}

/// Render one PDF page to pixels.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, page: PageBox, dpi: u32) -> Result<DynamicImage, CodecError>;
}

/// Single-writer page accumulator for PDF assembly.
pub trait DocumentBuilder {
    /// Append a page holding `image` at `placement`. Returns the new page count.
    fn add_image_page(
        &mut self,
        image: &EmbeddedImage,
        page: PageBox,
        placement: Placement,
    ) -> Result<usize, DocumentError>;

    fn page_count(&self) -> usize;

    /// Finish the document and write it out.
    fn serialize(self) -> Result<Vec<u8>, DocumentError>
    where
        Self: Sized;
}
