use super::{CodecError, PageBox, PageRasterizer};
use crate::geometry;
use image::{DynamicImage, Rgb, RgbImage};

/// Largest rendered side, in pixels.
const MAX_RENDERED_SIDE: u32 = 10_000;

/// Produces a white canvas of the page's rendered size.
///
/// Stands in for a real PDF renderer: page geometry, DPI scaling and output
/// encoding are exercised, page content is not drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankPageRasterizer;

impl PageRasterizer for BlankPageRasterizer {
    fn rasterize(&self, page: PageBox, dpi: u32) -> Result<DynamicImage, CodecError> {
        let (width, height) = geometry::rendered_size(page, dpi);
        if width > MAX_RENDERED_SIDE || height > MAX_RENDERED_SIDE {
            return Err(CodecError::Geometry(format!(
                "Rendered page would be {width}x{height}px, above the {MAX_RENDERED_SIDE}px limit"
            )));
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([255, 255, 255]),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_letter_page_at_dpi() {
        let page = PageBox {
            width: 612.0,
            height: 792.0,
        };
        let image = BlankPageRasterizer.rasterize(page, 100).unwrap();
        assert_eq!((image.width(), image.height()), (850, 1100));
    }

    #[test]
    fn refuses_huge_renders() {
        let page = PageBox {
            width: 14_400.0,
            height: 14_400.0,
        };
        assert!(BlankPageRasterizer.rasterize(page, 150).is_err());
    }
}
