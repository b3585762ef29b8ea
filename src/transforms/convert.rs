use super::{blocking, EncodedImage};
use crate::batch::Transform;
use crate::engines::ImageCodec;
use crate::error::TransformError;
use crate::formats::{output_name, OutputFormat, Quality};
use crate::geometry;
use crate::request::InputItem;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Optional bounding box; images are shrunk to fit, never enlarged.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Format conversion with optional downscaling.
pub struct ConvertTransform {
    codec: Arc<dyn ImageCodec>,
    options: ConvertOptions,
}

impl ConvertTransform {
    pub fn new(codec: Arc<dyn ImageCodec>, options: ConvertOptions) -> Self {
        Self { codec, options }
    }
}

fn convert_one(
    codec: &dyn ImageCodec,
    item: &InputItem,
    options: &ConvertOptions,
) -> Result<EncodedImage, TransformError> {
    let decoded = codec.decode(&item.content)?;
    let source = (decoded.width, decoded.height);

    let image = match geometry::resize_target(source, options.width, options.height, false) {
        Some((w, h)) => codec.resize(&decoded.image, w, h),
        None => decoded.image,
    };
    let bytes = codec.encode(&image, options.format, options.quality)?;

    Ok(EncodedImage {
        filename: output_name(&item.name, "image", options.format.extension()),
        format: options.format,
        bytes,
        width: image.width(),
        height: image.height(),
    })
}

#[async_trait]
impl Transform for ConvertTransform {
    type Input = InputItem;
    type Output = EncodedImage;

    async fn apply(&self, input: InputItem) -> Result<EncodedImage, TransformError> {
        let codec = Arc::clone(&self.codec);
        let options = self.options;
        blocking(move || convert_one(codec.as_ref(), &input, &options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{engine, jpeg_item, png_item, truncated_item};
    use image::ImageFormat;

    fn options(format: OutputFormat) -> ConvertOptions {
        ConvertOptions {
            format,
            quality: Quality::new(90),
            width: None,
            height: None,
        }
    }

    #[tokio::test]
    async fn jpeg_to_png_keeps_dimensions() {
        let transform = ConvertTransform::new(engine(), options(OutputFormat::Png));
        let out = transform.apply(jpeg_item("beach.jpg", 120, 80)).await.unwrap();

        assert_eq!(out.filename, "beach.png");
        assert_eq!((out.width, out.height), (120, 80));
        let decoded = engine().decode(&out.bytes).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (120, 80));
    }

    #[tokio::test]
    async fn downscales_inside_bounding_box() {
        let mut opts = options(OutputFormat::Jpeg);
        opts.width = Some(60);
        let transform = ConvertTransform::new(engine(), opts);
        let out = transform.apply(png_item("wide.png", 240, 120)).await.unwrap();

        assert_eq!(out.filename, "wide.jpg");
        assert_eq!((out.width, out.height), (60, 30));
    }

    #[tokio::test]
    async fn never_enlarges() {
        let mut opts = options(OutputFormat::Png);
        opts.width = Some(1000);
        opts.height = Some(1000);
        let transform = ConvertTransform::new(engine(), opts);
        let out = transform.apply(png_item("small.png", 40, 20)).await.unwrap();
        assert_eq!((out.width, out.height), (40, 20));
    }

    #[tokio::test]
    async fn corrupt_input_is_an_item_error() {
        let transform = ConvertTransform::new(engine(), options(OutputFormat::WebP));
        let err = transform.apply(truncated_item("bad.png")).await.unwrap_err();
        assert!(matches!(err, TransformError::CorruptInput(_)), "got {err:?}");
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn repeated_conversion_is_stable() {
        let transform = ConvertTransform::new(engine(), options(OutputFormat::WebP));
        let item = jpeg_item("same.jpg", 77, 33);
        let first = transform.apply(item.clone()).await.unwrap();
        let second = transform.apply(item).await.unwrap();

        assert_eq!(first.format, second.format);
        assert_eq!((first.width, first.height), (second.width, second.height));
        assert_eq!(first.filename, second.filename);
    }
}
