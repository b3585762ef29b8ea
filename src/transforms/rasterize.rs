use super::{blocking, EncodedImage};
use crate::batch::{BatchItem, Transform};
use crate::engines::{ImageCodec, LoadedDocument, PageBox, PageRasterizer};
use crate::error::{TransformError, ValidationError};
use crate::formats::{OutputFormat, Quality};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterOptions {
    pub format: OutputFormat,
    pub quality: Quality,
    pub dpi: u32,
    /// `all`, or comma-separated 1-based pages and ranges such as `1,3,5-7`.
    pub page_range: String,
}

/// Zero-based page indices selected by `range`, sorted and deduplicated.
///
/// Pages outside `1..=page_count` and unparsable parts are ignored. An open
/// range (`-3`, `5-`) runs to the first or last page.
pub fn resolve_page_range(range: &str, page_count: usize) -> Vec<usize> {
    let range = range.trim();
    if range.is_empty() || range.eq_ignore_ascii_case("all") {
        return (0..page_count).collect();
    }

    let mut pages = BTreeSet::new();
    for part in range.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = match start.trim() {
                "" => Some(1),
                s => s.parse::<usize>().ok(),
            };
            let end = match end.trim() {
                "" => Some(page_count),
                s => s.parse::<usize>().ok(),
            };
            if let (Some(start), Some(end)) = (start, end) {
                let end = end.min(page_count);
                for page in start.max(1)..=end {
                    pages.insert(page - 1);
                }
            }
        } else if let Ok(page) = part.parse::<usize>() {
            if (1..=page_count).contains(&page) {
                pages.insert(page - 1);
            }
        }
    }
    pages.into_iter().collect()
}

/// One page queued for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageJob {
    /// Zero-based.
    pub index: usize,
    pub page: PageBox,
}

impl BatchItem for PageJob {
    fn label(&self) -> String {
        format!("page {}", self.index + 1)
    }
}

/// Check a loaded document against the page limit and turn the requested
/// range into render jobs.
pub fn plan_pages(
    document: &LoadedDocument,
    page_range: &str,
    max_pages: usize,
) -> Result<Vec<PageJob>, ValidationError> {
    if document.page_count == 0 {
        return Err(ValidationError::EmptyDocument);
    }
    if document.page_count > max_pages {
        return Err(ValidationError::TooManyPages {
            pages: document.page_count,
            max: max_pages,
        });
    }

    let jobs: Vec<PageJob> = resolve_page_range(page_range, document.page_count)
        .into_iter()
        .map(|index| PageJob {
            index,
            page: document.pages[index],
        })
        .collect();

    if jobs.is_empty() {
        return Err(ValidationError::NoValidPages);
    }
    Ok(jobs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// One-based.
    pub page: usize,
    pub image: EncodedImage,
}

pub struct RasterTransform {
    rasterizer: Arc<dyn PageRasterizer>,
    codec: Arc<dyn ImageCodec>,
    options: RasterOptions,
}

impl RasterTransform {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        codec: Arc<dyn ImageCodec>,
        options: RasterOptions,
    ) -> Self {
        Self {
            rasterizer,
            codec,
            options,
        }
    }
}

#[async_trait]
impl Transform for RasterTransform {
    type Input = PageJob;
    type Output = RenderedPage;

    async fn apply(&self, job: PageJob) -> Result<RenderedPage, TransformError> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let codec = Arc::clone(&self.codec);
        let (format, quality, dpi) = (self.options.format, self.options.quality, self.options.dpi);

        blocking(move || {
            let pixels = rasterizer.rasterize(job.page, dpi)?;
            let bytes = codec.encode(&pixels, format, quality)?;
            let page = job.index + 1;
            Ok(RenderedPage {
                page,
                image: EncodedImage {
                    filename: format!("page-{:03}.{}", page, format.extension()),
                    format,
                    bytes,
                    width: pixels.width(),
                    height: pixels.height(),
                },
            })
        })
        .await
    }
}
