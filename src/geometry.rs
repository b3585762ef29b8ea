//! Pure dimension calculations. No I/O, no pixels.

use crate::engines::{PageBox, Placement};

/// Dimensions that fit inside `bounds` while keeping the source aspect ratio.
///
/// At least one side matches its bound exactly; the other is at most its bound.
/// Results never collapse below 1px.
pub fn fit_inside(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w == 0 || src_h == 0 {
        return (max_w.max(1), max_h.max(1));
    }

    let scale = f64::min(max_w as f64 / src_w as f64, max_h as f64 / src_h as f64);
    let w = (src_w as f64 * scale).round().clamp(1.0, max_w.max(1) as f64) as u32;
    let h = (src_h as f64 * scale).round().clamp(1.0, max_h.max(1) as f64) as u32;
    (w, h)
}

/// Resize target for an optional width and/or height box.
///
/// A missing side is unconstrained. With `allow_enlarge == false` an image
/// already inside the box keeps its size. Returns `None` when nothing changes.
pub fn resize_target(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    allow_enlarge: bool,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if width.is_none() && height.is_none() {
        return None;
    }
    if !allow_enlarge
        && width.map_or(true, |w| src_w <= w)
        && height.map_or(true, |h| src_h <= h)
    {
        return None;
    }

    let bounds = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, u32::MAX),
        (None, Some(h)) => (u32::MAX, h),
        (None, None) => return None,
    };
    let target = fit_inside(source, bounds);
    if target == source {
        None
    } else {
        Some(target)
    }
}

/// Shrink both sides by `margin_percent` (0..50), rounding down.
pub fn shrink_by_margin(source: (u32, u32), margin_percent: f32) -> (u32, u32) {
    let factor = 1.0 - f64::from(margin_percent) / 100.0;
    let w = (source.0 as f64 * factor).floor().max(1.0) as u32;
    let h = (source.1 as f64 * factor).floor().max(1.0) as u32;
    (w, h)
}

/// Centre an image of `image` points on `page`, scaling it down when it
/// would overflow the page.
pub fn center_on_page(page: PageBox, image: (f32, f32)) -> Placement {
    let (mut w, mut h) = image;
    if w > page.width || h > page.height {
        let scale = f32::min(page.width / w, page.height / h);
        w *= scale;
        h *= scale;
    }
    Placement {
        x: ((page.width - w) / 2.0).max(0.0),
        y: ((page.height - h) / 2.0).max(0.0),
        width: w,
        height: h,
    }
}

/// Pixel size of a page rendered at `dpi`.
pub fn rendered_size(page: PageBox, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    (
        (page.width * scale).round().max(1.0) as u32,
        (page.height * scale).round().max(1.0) as u32,
    )
}
