use super::{CodecError, CropRect, Decoded, IconPacker, ImageCodec};
use crate::formats::{OutputFormat, Quality};
use crate::geometry;
use image::codecs::avif::AvifEncoder;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageError, ImageReader, Rgba, RgbaImage};
use std::borrow::Cow;
use std::io::Cursor;

/// Input extensions with decoders compiled in.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico",
];

/// AVIF encoder speed (1 slowest .. 10 fastest).
const AVIF_SPEED: u8 = 6;

/// Image codec backed by the pure-Rust `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn supported_extensions(&self) -> Vec<&'static str> {
        SUPPORTED_EXTENSIONS.to_vec()
    }
}

fn encode_error(err: ImageError) -> CodecError {
    CodecError::Encode(err.to_string())
}

/// Composite any alpha onto white and drop to 8-bit RGB.
fn flatten_onto_white(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return DynamicImage::ImageRgb8(image.to_rgb8());
    }
    let rgba = image.to_rgba8();
    let mut canvas = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &rgba, 0, 0);
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// 8-bit RGB or RGBA, the common denominator of the lossless encoders.
fn to_rgb_family(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// PNG additionally keeps 8-bit grayscale as-is.
fn to_png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => Cow::Borrowed(image),
        other => to_rgb_family(other),
    }
}

/// Inverse-mapped bilinear rotation for angles that are not multiples of 90.
/// `image` itself only rotates by quarter turns.
fn rotate_any(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let src = image.to_rgba8();
    let (w, h) = (src.width() as f64, src.height() as f64);
    let (sin, cos) = degrees.to_radians().sin_cos();

    let out_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ox, oy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let mut out = RgbaImage::from_pixel(out_w, out_h, Rgba([0, 0, 0, 255]));
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - ox;
        let dy = y as f64 + 0.5 - oy;
        let sx = dx * cos + dy * sin + cx - 0.5;
        let sy = -dx * sin + dy * cos + cy - 0.5;
        if let Some(sample) = sample_bilinear(&src, sx, sy) {
            *pixel = sample;
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let max_x = (src.width() - 1) as f64;
    let max_y = (src.height() - 1) as f64;
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(src.width() - 1), (y0 + 1).min(src.height() - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

impl ImageCodec for ImageEngine {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::CorruptInput(e.to_string()))?;
        let format = reader.format().ok_or(CodecError::UnsupportedFormat)?;
        if !format.reading_enabled() {
            return Err(CodecError::UnsupportedFormat);
        }

        let image = reader.decode().map_err(|e| match e {
            ImageError::Unsupported(_) => CodecError::UnsupportedFormat,
            other => CodecError::CorruptInput(other.to_string()),
        })?;

        Ok(Decoded {
            format,
            width: image.width(),
            height: image.height(),
            image,
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        match format {
            OutputFormat::Jpeg => flatten_onto_white(image)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.value())),
            OutputFormat::Png => to_png_compatible(image).write_with_encoder(
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive),
            ),
            // The pure-Rust WebP encoder is lossless only.
            OutputFormat::WebP => {
                to_rgb_family(image).write_with_encoder(WebPEncoder::new_lossless(&mut buf))
            }
            OutputFormat::Avif => to_rgb_family(image).write_with_encoder(
                AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality.value()),
            ),
            OutputFormat::Tiff => to_rgb_family(image)
                .write_with_encoder(TiffEncoder::new(Cursor::new(&mut buf))),
        }
        .map_err(encode_error)?;
        Ok(buf)
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width.max(1), height.max(1), FilterType::Lanczos3)
    }

    fn contain(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        background: Rgba<u8>,
    ) -> DynamicImage {
        let (width, height) = (width.max(1), height.max(1));
        let (w, h) = geometry::fit_inside((image.width(), image.height()), (width, height));
        let scaled = image.resize_exact(w, h, FilterType::Lanczos3).to_rgba8();

        let mut canvas = RgbaImage::from_pixel(width, height, background);
        let x = (width - w) / 2;
        let y = (height - h) / 2;
        imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
        DynamicImage::ImageRgba8(canvas)
    }

    fn crop(&self, image: &DynamicImage, rect: CropRect) -> Result<DynamicImage, CodecError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(CodecError::Geometry("Crop area must not be empty".to_string()));
        }
        let fits_x = rect.x.checked_add(rect.width).is_some_and(|r| r <= image.width());
        let fits_y = rect.y.checked_add(rect.height).is_some_and(|b| b <= image.height());
        if !fits_x || !fits_y {
            return Err(CodecError::Geometry(format!(
                "Crop area {}x{}+{}+{} lies outside the {}x{} image",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                image.width(),
                image.height()
            )));
        }
        Ok(image.crop_imm(rect.x, rect.y, rect.width, rect.height))
    }

    fn rotate(&self, image: &DynamicImage, degrees: i32) -> DynamicImage {
        match degrees.rem_euclid(360) {
            0 => image.clone(),
            90 => image.rotate90(),
            180 => image.rotate180(),
            270 => image.rotate270(),
            other => rotate_any(image, f64::from(other)),
        }
    }
}

impl IconPacker for ImageEngine {
    fn pack_icon_set(&self, frames: &[DynamicImage]) -> Result<Vec<u8>, CodecError> {
        let mut icons = Vec::with_capacity(frames.len());
        for frame in frames {
            let rgba = frame.to_rgba8();
            let icon =
                IcoFrame::as_png(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
                    .map_err(encode_error)?;
            icons.push(icon);
        }

        let mut buf = Vec::new();
        IcoEncoder::new(&mut buf)
            .encode_images(&icons)
            .map_err(encode_error)?;
        Ok(buf)
    }
}
