//! Output formats and encode parameters shared by every route.

use std::fmt;

/// Image formats the service can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Avif,
    Tiff,
}

/// Names accepted in the `format` field of the convert route.
pub const CONVERT_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "avif", "tiff"];

/// Names accepted in the `format` field of the PDF-to-image route.
pub const PAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp"];

impl OutputFormat {
    /// Look up a format by its user-facing name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    /// File extension used for output names.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Tiff => "tiff",
        }
    }

    pub fn mime(self) -> mime::Mime {
        match self {
            OutputFormat::Png => mime::IMAGE_PNG,
            OutputFormat::Jpeg => mime::IMAGE_JPEG,
            OutputFormat::WebP => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
            OutputFormat::Avif => "image/avif".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
            OutputFormat::Tiff => "image/tiff".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Replace the extension of an uploaded file name, falling back to `fallback`
/// when nothing is left of the stem.
pub fn output_name(input: &str, fallback: &str, extension: &str) -> String {
    format!("{}.{}", file_stem(input, fallback), extension)
}

/// Everything before the last dot. Names without a dot have no stem.
pub fn file_stem<'a>(input: &'a str, fallback: &'a str) -> &'a str {
    match input.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => fallback,
    }
}
