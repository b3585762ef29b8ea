use super::{blocking, EncodedImage};
use crate::batch::Transform;
use crate::engines::{CropRect, ImageCodec};
use crate::error::TransformError;
use crate::formats::{OutputFormat, Quality};
use crate::geometry;
use crate::request::InputItem;
use async_trait::async_trait;
use std::sync::Arc;

/// Single-image edits. Every edit re-encodes to JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOperation {
    Compress,
    Resize {
        width: u32,
        height: u32,
        /// Fit inside the box without enlarging instead of stretching to it.
        keep_aspect_ratio: bool,
    },
    Crop(CropRect),
    /// Clockwise, in degrees.
    Rotate { degrees: i32 },
}

impl EditOperation {
    /// Attachment name of the result.
    pub fn output_name(&self) -> &'static str {
        match self {
            EditOperation::Compress => "compressed-image.jpg",
            EditOperation::Resize { .. } => "resized-image.jpg",
            EditOperation::Crop(_) => "cropped-image.jpg",
            EditOperation::Rotate { .. } => "rotated-image.jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    pub operation: EditOperation,
    pub quality: Quality,
}

pub struct EditTransform {
    codec: Arc<dyn ImageCodec>,
    options: EditOptions,
}

impl EditTransform {
    pub fn new(codec: Arc<dyn ImageCodec>, options: EditOptions) -> Self {
        Self { codec, options }
    }
}

fn edit_one(
    codec: &dyn ImageCodec,
    item: &InputItem,
    options: &EditOptions,
) -> Result<EncodedImage, TransformError> {
    let decoded = codec.decode(&item.content)?;
    let source = (decoded.width, decoded.height);

    let image = match options.operation {
        EditOperation::Compress => decoded.image,
        EditOperation::Resize {
            width,
            height,
            keep_aspect_ratio: true,
        } => match geometry::resize_target(source, Some(width), Some(height), false) {
            Some((w, h)) => codec.resize(&decoded.image, w, h),
            None => decoded.image,
        },
        EditOperation::Resize { width, height, .. } => codec.resize(&decoded.image, width, height),
        EditOperation::Crop(rect) => codec.crop(&decoded.image, rect)?,
        EditOperation::Rotate { degrees } => codec.rotate(&decoded.image, degrees),
    };

    let bytes = codec.encode(&image, OutputFormat::Jpeg, options.quality)?;
    Ok(EncodedImage {
        filename: options.operation.output_name().to_string(),
        format: OutputFormat::Jpeg,
        bytes,
        width: image.width(),
        height: image.height(),
    })
}

#[async_trait]
impl Transform for EditTransform {
    type Input = InputItem;
    type Output = EncodedImage;

    async fn apply(&self, input: InputItem) -> Result<EncodedImage, TransformError> {
        let codec = Arc::clone(&self.codec);
        let options = self.options;
        blocking(move || edit_one(codec.as_ref(), &input, &options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{engine, png_item};
    use image::ImageFormat;

    async fn run(operation: EditOperation, width: u32, height: u32) -> Result<EncodedImage, TransformError> {
        let options = EditOptions {
            operation,
            quality: Quality::new(80),
        };
        EditTransform::new(engine(), options)
            .apply(png_item("in.png", width, height))
            .await
    }

    #[tokio::test]
    async fn compress_reencodes_as_jpeg() {
        let out = run(EditOperation::Compress, 50, 40).await.unwrap();
        assert_eq!(out.filename, "compressed-image.jpg");
        assert_eq!(engine().decode(&out.bytes).unwrap().format, ImageFormat::Jpeg);
        assert_eq!((out.width, out.height), (50, 40));
    }

    #[tokio::test]
    async fn resize_stretches_without_aspect_ratio() {
        let op = EditOperation::Resize {
            width: 30,
            height: 90,
            keep_aspect_ratio: false,
        };
        let out = run(op, 60, 60).await.unwrap();
        assert_eq!((out.width, out.height), (30, 90));
        assert_eq!(out.filename, "resized-image.jpg");
    }

    #[tokio::test]
    async fn resize_keeps_aspect_ratio_inside_box() {
        let op = EditOperation::Resize {
            width: 100,
            height: 100,
            keep_aspect_ratio: true,
        };
        let out = run(op, 400, 200).await.unwrap();
        assert_eq!((out.width, out.height), (100, 50));
    }

    #[tokio::test]
    async fn crop_extracts_rectangle() {
        let op = EditOperation::Crop(CropRect {
            x: 5,
            y: 5,
            width: 20,
            height: 10,
        });
        let out = run(op, 40, 40).await.unwrap();
        assert_eq!((out.width, out.height), (20, 10));
    }

    #[tokio::test]
    async fn crop_outside_image_fails() {
        let op = EditOperation::Crop(CropRect {
            x: 30,
            y: 30,
            width: 20,
            height: 20,
        });
        let err = run(op, 40, 40).await.unwrap_err();
        assert!(matches!(err, TransformError::Geometry(_)));
    }

    #[tokio::test]
    async fn rotate_quarter_turn() {
        let out = run(EditOperation::Rotate { degrees: 90 }, 40, 20).await.unwrap();
        assert_eq!((out.width, out.height), (20, 40));
        assert_eq!(out.filename, "rotated-image.jpg");
    }
}
