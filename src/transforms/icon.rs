use super::blocking;
use crate::batch::Transform;
use crate::engines::{IconPacker, ImageCodec};
use crate::error::TransformError;
use crate::request::InputItem;
use async_trait::async_trait;
use image::Rgba;
use std::sync::Arc;

/// Square sizes an ICO frame may have.
pub const ICON_SIZES: &[u32] = &[16, 32, 48, 64, 128, 256];

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconOptions {
    /// Sorted, deduplicated, all in [`ICON_SIZES`].
    pub sizes: Vec<u32>,
}

impl IconOptions {
    /// Keep the supported sizes out of `requested`. `None` when none are left.
    pub fn from_requested(requested: &[u32]) -> Option<Self> {
        let mut sizes: Vec<u32> = requested
            .iter()
            .copied()
            .filter(|s| ICON_SIZES.contains(s))
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        (!sizes.is_empty()).then_some(Self { sizes })
    }

    /// `icon_16x32x48_32bit.ico`
    pub fn filename(&self) -> String {
        let sizes: Vec<String> = self.sizes.iter().map(u32::to_string).collect();
        format!("icon_{}_32bit.ico", sizes.join("x"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Decodes once and packs one frame per requested size.
pub struct IconTransform {
    codec: Arc<dyn ImageCodec>,
    packer: Arc<dyn IconPacker>,
    options: IconOptions,
}

impl IconTransform {
    pub fn new(codec: Arc<dyn ImageCodec>, packer: Arc<dyn IconPacker>, options: IconOptions) -> Self {
        Self {
            codec,
            packer,
            options,
        }
    }
}

#[async_trait]
impl Transform for IconTransform {
    type Input = InputItem;
    type Output = IconFile;

    async fn apply(&self, input: InputItem) -> Result<IconFile, TransformError> {
        let codec = Arc::clone(&self.codec);
        let packer = Arc::clone(&self.packer);
        let options = self.options.clone();

        blocking(move || {
            let decoded = codec.decode(&input.content)?;
            let frames: Vec<_> = options
                .sizes
                .iter()
                .map(|&size| codec.contain(&decoded.image, size, size, TRANSPARENT))
                .collect();
            let bytes = packer.pack_icon_set(&frames)?;
            Ok(IconFile {
                filename: options.filename(),
                bytes,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{engine, png_item, truncated_item};
    use image::ImageFormat;

    #[test]
    fn requested_sizes_are_filtered_and_sorted() {
        let options = IconOptions::from_requested(&[48, 16, 20, 48, 256]).unwrap();
        assert_eq!(options.sizes, vec![16, 48, 256]);
        assert_eq!(options.filename(), "icon_16x48x256_32bit.ico");
        assert_eq!(IconOptions::from_requested(&[7, 1000]), None);
    }

    fn small_set() -> IconOptions {
        IconOptions::from_requested(&[16, 32, 48]).unwrap()
    }

    #[tokio::test]
    async fn packs_one_frame_per_size() {
        let codec = engine();
        let transform = IconTransform::new(codec.clone(), codec.clone(), small_set());
        let icon = transform.apply(png_item("logo.png", 100, 60)).await.unwrap();

        assert_eq!(icon.filename, "icon_16x32x48_32bit.ico");
        // ICONDIR: reserved 0, type 1, count
        assert_eq!(&icon.bytes[0..4], &[0, 0, 1, 0]);
        assert_eq!(u16::from_le_bytes([icon.bytes[4], icon.bytes[5]]), 3);
        assert_eq!(image::guess_format(&icon.bytes).unwrap(), ImageFormat::Ico);
    }

    #[tokio::test]
    async fn undecodable_source_fails() {
        let codec = engine();
        let transform = IconTransform::new(codec.clone(), codec, small_set());
        assert!(transform.apply(truncated_item("logo.png")).await.is_err());
    }
}
