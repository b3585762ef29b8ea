//! Images to one PDF, one page per image.
//!
//! Page preparation (decode, margin, JPEG encode) runs concurrently per item.
//! Page insertion goes through [`PageAccumulator`], the single writer the
//! coordinator feeds in input order.

use super::blocking;
use crate::batch::{Accumulator, Transform};
use crate::engines::{DocumentBuilder, DocumentError, EmbeddedImage, ImageCodec, PageBox};
use crate::error::TransformError;
use crate::formats::{file_stem, OutputFormat, Quality};
use crate::geometry;
use crate::request::InputItem;
use async_trait::async_trait;
use chrono::NaiveDate;
use image::{ImageFormat, Rgba};
use std::sync::Arc;

pub const PAGE_SIZES: &[&str] = &["auto", "a4", "a5", "letter", "legal", "tabloid"];
pub const ORIENTATIONS: &[&str] = &["auto", "portrait", "landscape"];

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// The page takes the image's pixel size, one pixel per point.
    Auto,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PageSize {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(PageSize::Auto),
            "a4" => Some(PageSize::A4),
            "a5" => Some(PageSize::A5),
            "letter" => Some(PageSize::Letter),
            "legal" => Some(PageSize::Legal),
            "tabloid" => Some(PageSize::Tabloid),
            _ => None,
        }
    }

    /// Portrait width and height in points.
    pub fn points(self) -> Option<(f32, f32)> {
        match self {
            PageSize::Auto => None,
            PageSize::A4 => Some((595.0, 842.0)),
            PageSize::A5 => Some((420.0, 595.0)),
            PageSize::Letter => Some((612.0, 792.0)),
            PageSize::Legal => Some((612.0, 1008.0)),
            PageSize::Tabloid => Some((792.0, 1224.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Portrait for named page sizes; `auto` pages already follow the image.
    Auto,
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(Orientation::Auto),
            "portrait" => Some(Orientation::Portrait),
            "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub quality: Quality,
    /// Percent of each side trimmed off the image, `0.0..50.0`.
    pub margin: f32,
}

impl PdfLayout {
    /// Page box for an image of `image` pixels.
    pub fn page_for(&self, image: (u32, u32)) -> PageBox {
        let Some((short, long)) = self.page_size.points() else {
            return PageBox {
                width: image.0 as f32,
                height: image.1 as f32,
            };
        };
        let landscape = match self.orientation {
            Orientation::Auto | Orientation::Portrait => false,
            Orientation::Landscape => true,
        };
        if landscape {
            PageBox {
                width: long,
                height: short,
            }
        } else {
            PageBox {
                width: short,
                height: long,
            }
        }
    }

    fn allows_passthrough(&self) -> bool {
        self.page_size == PageSize::Auto && self.margin == 0.0
    }
}

/// Number of colour components declared by a DCT frame header, if the bytes
/// are a baseline, extended or progressive JPEG.
pub(crate) fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            // fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // standalone markers
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            0xC0..=0xC2 => return bytes.get(i + 9).copied(),
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}

/// Turns one uploaded image into an embeddable JPEG.
pub struct PdfPageTransform {
    codec: Arc<dyn ImageCodec>,
    layout: PdfLayout,
}

impl PdfPageTransform {
    pub fn new(codec: Arc<dyn ImageCodec>, layout: PdfLayout) -> Self {
        Self { codec, layout }
    }
}

fn prepare_page(
    codec: &dyn ImageCodec,
    item: &InputItem,
    layout: &PdfLayout,
) -> Result<EmbeddedImage, TransformError> {
    let decoded = codec.decode(&item.content)?;

    // Declared and sniffed JPEGs go in untouched when nothing needs redrawing.
    if layout.allows_passthrough()
        && item.media_type == "image/jpeg"
        && decoded.format == ImageFormat::Jpeg
    {
        if let Some(components @ (1 | 3)) = jpeg_components(&item.content) {
            return Ok(EmbeddedImage {
                jpeg: item.content.to_vec(),
                width: decoded.width,
                height: decoded.height,
                components,
            });
        }
    }

    let image = if layout.margin > 0.0 {
        let (w, h) = geometry::shrink_by_margin((decoded.width, decoded.height), layout.margin);
        codec.contain(&decoded.image, w, h, WHITE)
    } else {
        decoded.image
    };
    let jpeg = codec.encode(&image, OutputFormat::Jpeg, layout.quality)?;

    Ok(EmbeddedImage {
        jpeg,
        width: image.width(),
        height: image.height(),
        components: 3,
    })
}

#[async_trait]
impl Transform for PdfPageTransform {
    type Input = InputItem;
    type Output = EmbeddedImage;

    async fn apply(&self, input: InputItem) -> Result<EmbeddedImage, TransformError> {
        let codec = Arc::clone(&self.codec);
        let layout = self.layout;
        blocking(move || prepare_page(codec.as_ref(), &input, &layout)).await
    }
}

/// Where a prepared image ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedPage {
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
}

/// Appends prepared images to a document, one page each.
pub struct PageAccumulator<B> {
    builder: B,
    layout: PdfLayout,
}

impl<B: DocumentBuilder> PageAccumulator<B> {
    pub fn new(builder: B, layout: PdfLayout) -> Self {
        Self { builder, layout }
    }

    pub fn page_count(&self) -> usize {
        self.builder.page_count()
    }

    pub fn finish(self) -> Result<Vec<u8>, DocumentError> {
        self.builder.serialize()
    }
}

impl<B: DocumentBuilder> Accumulator<EmbeddedImage> for PageAccumulator<B> {
    type Receipt = PlacedPage;

    fn accept(&mut self, _name: &str, image: EmbeddedImage) -> Result<PlacedPage, TransformError> {
        let page = self.layout.page_for((image.width, image.height));
        let placement = geometry::center_on_page(page, (image.width as f32, image.height as f32));
        let page_number = self.builder.add_image_page(&image, page, placement)?;
        Ok(PlacedPage {
            page_number,
            width: image.width,
            height: image.height,
        })
    }
}

/// `<stem>.pdf` for a single upload, `images-<date>.pdf` otherwise.
pub fn document_name(files: &[InputItem], today: NaiveDate) -> String {
    match files {
        [only] => format!("{}.pdf", file_stem(&only.name, "image")),
        _ => format!("images-{}.pdf", today.format("%Y-%m-%d")),
    }
}
