//! Per-route request validation.
//!
//! Every validator checks the same things in the same order and stops at the
//! first violation: files present, file count, required options, option
//! ranges, then each file's size. Missing optional values are filled in with
//! the route's defaults; present but malformed values are rejected.

use crate::config::RouteLimits;
use crate::engines::CropRect;
use crate::error::ValidationError;
use crate::formats::{OutputFormat, Quality, CONVERT_FORMATS, PAGE_FORMATS};
use crate::request::{InputItem, RawForm};
use crate::transforms::assemble::{Orientation, PageSize, PdfLayout, ORIENTATIONS, PAGE_SIZES};
use crate::transforms::convert::ConvertOptions;
use crate::transforms::edit::{EditOperation, EditOptions};
use crate::transforms::icon::IconOptions;
use crate::transforms::rasterize::RasterOptions;

type Checked<T> = Result<T, ValidationError>;

/// Files that passed validation together with their normalized options.
#[derive(Debug, Clone)]
pub struct Validated<O> {
    pub files: Vec<InputItem>,
    pub options: O,
}

pub const DEFAULT_DPI: u32 = 150;
const MAX_DPI: i64 = 600;
const MAX_MARGIN: f32 = 50.0;
/// Largest side a JPEG can carry.
const MAX_SIDE: i64 = 65_535;
/// Resize output cap: one RGBA buffer inside the decoder's default allocation limit.
const MAX_OUTPUT_PIXELS: u64 = 512 * 1024 * 1024 / 4;

fn check_count(form: &RawForm, limits: &RouteLimits) -> Checked<()> {
    if form.files.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    if form.files.len() > limits.max_files {
        return Err(ValidationError::TooManyFiles {
            max: limits.max_files,
        });
    }
    Ok(())
}

fn finish<O>(form: RawForm, limits: &RouteLimits, options: O) -> Checked<Validated<O>> {
    if let Some(file) = form.files.iter().find(|f| f.size() > limits.max_file_size) {
        return Err(ValidationError::FileTooLarge {
            name: file.name.clone(),
            limit_mb: limits.max_file_size_mb(),
        });
    }
    Ok(Validated {
        files: form.files,
        options,
    })
}

fn require<'a>(form: &'a RawForm, field: &'static str) -> Checked<&'a str> {
    form.field(field).ok_or(ValidationError::MissingOption(field))
}

fn integer(form: &RawForm, field: &'static str) -> Checked<Option<i64>> {
    form.field(field)
        .map(|raw| {
            raw.parse::<i64>().map_err(|_| ValidationError::InvalidOption {
                field,
                reason: format!("{raw:?} is not a whole number"),
            })
        })
        .transpose()
}

fn in_range(
    value: i64,
    range: std::ops::RangeInclusive<i64>,
    field: &'static str,
    constraint: &'static str,
) -> Checked<i64> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange { field, constraint })
    }
}

fn quality(form: &RawForm, default: u32) -> Checked<Quality> {
    match integer(form, "quality")? {
        None => Ok(Quality::new(default)),
        Some(q) => {
            let q = in_range(q, 1..=100, "quality", "must be between 1 and 100")?;
            Ok(Quality::new(q as u32))
        }
    }
}

fn dimension(form: &RawForm, field: &'static str) -> Checked<Option<u32>> {
    integer(form, field)?
        .map(|v| in_range(v, 1..=i64::from(u32::MAX), field, "must be greater than 0").map(|v| v as u32))
        .transpose()
}

fn output_side(form: &RawForm, field: &'static str) -> Checked<u32> {
    let side = integer(form, field)?.ok_or(ValidationError::MissingOption(field))?;
    in_range(side, 1..=MAX_SIDE, field, "must be between 1 and 65535").map(|v| v as u32)
}

fn offset(form: &RawForm, field: &'static str) -> Checked<u32> {
    let value = integer(form, field)?.unwrap_or(0);
    in_range(value, 0..=i64::from(u32::MAX), field, "must be 0 or greater").map(|v| v as u32)
}

fn one_of(raw: &str, field: &'static str, allowed: &[&str]) -> ValidationError {
    ValidationError::InvalidOption {
        field,
        reason: format!("{raw:?} is not one of {}", allowed.join(", ")),
    }
}

pub fn convert(form: RawForm, limits: &RouteLimits) -> Checked<Validated<ConvertOptions>> {
    check_count(&form, limits)?;
    let raw_format = require(&form, "format")?;

    let format = OutputFormat::from_name(raw_format)
        .filter(|_| CONVERT_FORMATS.contains(&raw_format.to_ascii_lowercase().as_str()))
        .ok_or_else(|| one_of(raw_format, "format", CONVERT_FORMATS))?;
    let options = ConvertOptions {
        format,
        quality: quality(&form, 80)?,
        width: dimension(&form, "width")?,
        height: dimension(&form, "height")?,
    };
    finish(form, limits, options)
}

pub fn compress(form: RawForm, limits: &RouteLimits) -> Checked<Validated<EditOptions>> {
    check_count(&form, limits)?;
    let options = EditOptions {
        operation: EditOperation::Compress,
        quality: quality(&form, 60)?,
    };
    finish(form, limits, options)
}

pub fn resize(form: RawForm, limits: &RouteLimits) -> Checked<Validated<EditOptions>> {
    check_count(&form, limits)?;
    require(&form, "width")?;
    require(&form, "height")?;

    let width = output_side(&form, "width")?;
    let height = output_side(&form, "height")?;
    if u64::from(width) * u64::from(height) > MAX_OUTPUT_PIXELS {
        return Err(ValidationError::OutOfRange {
            field: "width",
            constraint: "times height must not exceed 134217728 pixels",
        });
    }
    let keep_aspect_ratio = form
        .field("keepAspectRatio")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let options = EditOptions {
        operation: EditOperation::Resize {
            width,
            height,
            keep_aspect_ratio,
        },
        quality: quality(&form, 80)?,
    };
    finish(form, limits, options)
}

pub fn crop(form: RawForm, limits: &RouteLimits) -> Checked<Validated<EditOptions>> {
    check_count(&form, limits)?;
    require(&form, "width")?;
    require(&form, "height")?;

    let rect = CropRect {
        x: offset(&form, "x")?,
        y: offset(&form, "y")?,
        width: dimension(&form, "width")?.ok_or(ValidationError::MissingOption("width"))?,
        height: dimension(&form, "height")?.ok_or(ValidationError::MissingOption("height"))?,
    };
    let options = EditOptions {
        operation: EditOperation::Crop(rect),
        quality: quality(&form, 80)?,
    };
    finish(form, limits, options)
}

pub fn rotate(form: RawForm, limits: &RouteLimits) -> Checked<Validated<EditOptions>> {
    check_count(&form, limits)?;
    let degrees = integer(&form, "angle")?.unwrap_or(0).rem_euclid(360) as i32;
    let options = EditOptions {
        operation: EditOperation::Rotate { degrees },
        quality: quality(&form, 80)?,
    };
    finish(form, limits, options)
}

pub fn image_to_pdf(form: RawForm, limits: &RouteLimits) -> Checked<Validated<PdfLayout>> {
    check_count(&form, limits)?;

    let page_size = match form.field("pageSize") {
        None => PageSize::Auto,
        Some(raw) => PageSize::from_name(raw).ok_or_else(|| one_of(raw, "pageSize", PAGE_SIZES))?,
    };
    let orientation = match form.field("orientation") {
        None => Orientation::Auto,
        Some(raw) => {
            Orientation::from_name(raw).ok_or_else(|| one_of(raw, "orientation", ORIENTATIONS))?
        }
    };
    let quality = quality(&form, 85)?;
    let margin = match form.field("margin") {
        None => 0.0,
        Some(raw) => {
            let margin = raw.parse::<f32>().map_err(|_| ValidationError::InvalidOption {
                field: "margin",
                reason: format!("{raw:?} is not a number"),
            })?;
            if !(0.0..MAX_MARGIN).contains(&margin) {
                return Err(ValidationError::OutOfRange {
                    field: "margin",
                    constraint: "must be at least 0 and below 50",
                });
            }
            margin
        }
    };

    let layout = PdfLayout {
        page_size,
        orientation,
        quality,
        margin,
    };
    finish(form, limits, layout)
}

pub fn pdf_to_image(form: RawForm, limits: &RouteLimits) -> Checked<Validated<RasterOptions>> {
    check_count(&form, limits)?;

    let format = match form.field("format") {
        None => OutputFormat::Jpeg,
        Some(raw) => OutputFormat::from_name(raw)
            .filter(|_| PAGE_FORMATS.contains(&raw.to_ascii_lowercase().as_str()))
            .ok_or_else(|| one_of(raw, "format", PAGE_FORMATS))?,
    };
    let quality = quality(&form, 85)?;
    let dpi = match integer(&form, "dpi")? {
        None => DEFAULT_DPI,
        Some(dpi) => in_range(dpi, 1..=MAX_DPI, "dpi", "must be between 1 and 600")? as u32,
    };
    let page_range = form.field("pageRange").unwrap_or("all").to_string();

    let options = RasterOptions {
        format,
        quality,
        dpi,
        page_range,
    };
    let validated = finish(form, limits, options)?;
    if validated.files.iter().any(|f| f.media_type != "application/pdf") {
        return Err(ValidationError::NotAPdf);
    }
    Ok(validated)
}

pub fn icon(form: RawForm, limits: &RouteLimits) -> Checked<Validated<IconOptions>> {
    check_count(&form, limits)?;
    let raw = require(&form, "sizes")?;

    let requested: Vec<u32> = serde_json::from_str(raw).map_err(|_| ValidationError::InvalidOption {
        field: "sizes",
        reason: "expected a JSON array of pixel sizes".to_string(),
    })?;
    let options = IconOptions::from_requested(&requested).ok_or(ValidationError::OutOfRange {
        field: "sizes",
        constraint: "must include at least one of 16, 32, 48, 64, 128, 256",
    })?;
    finish(form, limits, options)
}
