//! JSON envelopes and attachment responses.

use crate::batch::{BatchResult, ItemOutcome};
use crate::transforms::assemble::PlacedPage;
use crate::transforms::rasterize::RenderedPage;
use crate::transforms::EncodedImage;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

/// `data:<mime>;base64,<payload>`
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[derive(Debug, Serialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
}

fn failed_items<T>(result: &BatchResult<T>) -> Vec<FailedItem> {
    result
        .failures()
        .map(|(name, reason)| FailedItem {
            name: name.to_string(),
            error: reason.to_string(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ConvertedFile {
    pub name: String,
    pub data: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub files: Vec<ConvertedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<FailedItem>>,
}

impl From<BatchResult<EncodedImage>> for ConvertResponse {
    fn from(result: BatchResult<EncodedImage>) -> Self {
        let (converted, failed) = (result.succeeded(), result.failed());
        let failures = (failed > 0).then(|| failed_items(&result));

        let files = result
            .into_outcomes()
            .into_iter()
            .filter_map(|outcome| match outcome {
                ItemOutcome::Success { artifact, .. } => Some(ConvertedFile {
                    data: data_url(artifact.format.mime().essence_str(), &artifact.bytes),
                    name: artifact.filename,
                    width: artifact.width,
                    height: artifact.height,
                    format: artifact.format.extension().to_string(),
                    size: artifact.bytes.len(),
                }),
                ItemOutcome::Failure { .. } => None,
            })
            .collect();

        Self {
            files,
            converted_count: failures.as_ref().map(|_| converted),
            failed_count: failures.as_ref().map(|_| failed),
            failed: failures,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPdf {
    pub name: String,
    pub data: String,
    pub size: usize,
    pub page_count: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    pub failed_images: Vec<FailedItem>,
}

#[derive(Debug, Serialize)]
pub struct PdfResponse {
    pub files: Vec<MergedPdf>,
}

impl PdfResponse {
    pub fn new(name: String, pdf: &[u8], result: &BatchResult<PlacedPage>) -> Self {
        Self {
            files: vec![MergedPdf {
                name,
                data: data_url("application/pdf", pdf),
                size: pdf.len(),
                page_count: result.succeeded(),
                processed_count: result.succeeded(),
                failed_count: result.failed(),
                failed_images: failed_items(result),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageImage {
    pub name: String,
    pub data: String,
    pub page: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagesResponse {
    pub files: Vec<PageImage>,
    pub total_pages: usize,
    pub converted_pages: usize,
    pub original_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedItem>,
}

impl PagesResponse {
    pub fn new(result: BatchResult<RenderedPage>, total_pages: usize, original_name: String) -> Self {
        let failed = failed_items(&result);
        let files: Vec<PageImage> = result
            .into_outcomes()
            .into_iter()
            .filter_map(|outcome| match outcome {
                ItemOutcome::Success { artifact, .. } => Some(PageImage {
                    data: data_url(artifact.image.format.mime().essence_str(), &artifact.image.bytes),
                    name: artifact.image.filename,
                    page: artifact.page,
                    width: artifact.image.width,
                    height: artifact.image.height,
                }),
                ItemOutcome::Failure { .. } => None,
            })
            .collect();

        Self {
            converted_pages: files.len(),
            files,
            total_pages,
            original_name,
            failed,
        }
    }
}

/// Raw file download.
pub fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::OutputFormat;
    use serde_json::{json, Value};

    fn image(name: &str) -> EncodedImage {
        EncodedImage {
            filename: name.to_string(),
            format: OutputFormat::WebP,
            bytes: vec![1, 2, 3],
            width: 4,
            height: 5,
        }
    }

    fn batch(outcomes: Vec<ItemOutcome<EncodedImage>>) -> BatchResult<EncodedImage> {
        BatchResult::from_outcomes(outcomes)
    }

    #[test]
    fn data_url_encodes_payload() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn convert_envelope_omits_counts_when_all_succeed() {
        let result = batch(vec![ItemOutcome::Success {
            name: "a.png".into(),
            artifact: image("a.webp"),
        }]);
        let body: Value = serde_json::to_value(ConvertResponse::from(result)).unwrap();

        assert_eq!(
            body,
            json!({
                "files": [{
                    "name": "a.webp",
                    "data": "data:image/webp;base64,AQID",
                    "width": 4,
                    "height": 5,
                    "format": "webp",
                    "size": 3
                }]
            })
        );
    }

    #[test]
    fn convert_envelope_lists_failures() {
        let result = batch(vec![
            ItemOutcome::Success {
                name: "a.png".into(),
                artifact: image("a.webp"),
            },
            ItemOutcome::Failure {
                name: "b.png".into(),
                reason: "Invalid image file: truncated".into(),
            },
        ]);
        let body: Value = serde_json::to_value(ConvertResponse::from(result)).unwrap();

        assert_eq!(body["convertedCount"], 1);
        assert_eq!(body["failedCount"], 1);
        assert_eq!(
            body["failed"],
            json!([{ "name": "b.png", "error": "Invalid image file: truncated" }])
        );
        assert_eq!(body["files"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn pdf_envelope_counts_pages() {
        let result = BatchResult::from_outcomes(vec![
            ItemOutcome::Success {
                name: "a.png".into(),
                artifact: PlacedPage {
                    page_number: 1,
                    width: 10,
                    height: 10,
                },
            },
            ItemOutcome::Failure {
                name: "b.png".into(),
                reason: "Unsupported image format".into(),
            },
        ]);
        let body = serde_json::to_value(PdfResponse::new("x.pdf".into(), b"%PDF", &result)).unwrap();
        let file = &body["files"][0];

        assert_eq!(file["name"], "x.pdf");
        assert_eq!(file["pageCount"], 1);
        assert_eq!(file["processedCount"], 1);
        assert_eq!(file["failedCount"], 1);
        assert_eq!(file["failedImages"][0]["name"], "b.png");
        assert!(file["data"].as_str().unwrap().starts_with("data:application/pdf;base64,"));
    }

    #[test]
    fn attachment_sets_headers() {
        let response = attachment("image/jpeg", "rotated-image.jpg", vec![0xFF]);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"rotated-image.jpg\""
        );
    }
}
