//! In-memory fixtures shared by unit tests.

use crate::engines::{ImageCodec, ImageEngine};
use crate::formats::{OutputFormat, Quality};
use crate::request::InputItem;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::Arc;

pub fn engine() -> Arc<ImageEngine> {
    Arc::new(ImageEngine::new())
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90])
    }))
}

pub fn encoded(width: u32, height: u32, format: OutputFormat) -> Vec<u8> {
    ImageEngine::new()
        .encode(&gradient(width, height), format, Quality::new(90))
        .expect("fixture encodes")
}

pub fn png_item(name: &str, width: u32, height: u32) -> InputItem {
    InputItem::new(name, encoded(width, height, OutputFormat::Png), Some("image/png"))
}

pub fn jpeg_item(name: &str, width: u32, height: u32) -> InputItem {
    InputItem::new(name, encoded(width, height, OutputFormat::Jpeg), Some("image/jpeg"))
}

/// A PNG with a transparent border around an opaque square.
pub fn transparent_png_item(name: &str, size: u32) -> InputItem {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
        let inside = x > size / 4 && x < size * 3 / 4 && y > size / 4 && y < size * 3 / 4;
        if inside {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }));
    let bytes = ImageEngine::new()
        .encode(&image, OutputFormat::Png, Quality::default())
        .expect("fixture encodes");
    InputItem::new(name, bytes, Some("image/png"))
}

/// The first third of a valid PNG.
pub fn truncated_item(name: &str) -> InputItem {
    let bytes = encoded(64, 64, OutputFormat::Png);
    InputItem::new(name, bytes[..bytes.len() / 3].to_vec(), Some("image/png"))
}
