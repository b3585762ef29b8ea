#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixmill::config::Config;
use pixmill::engines::{DocumentBuilder, EmbeddedImage, PageBox, PdfBuilder, Placement};
use pixmill::handlers::AppState;
use serde_json::Value;
use std::io::{Cursor, Write};
use std::sync::Arc;

const BOUNDARY: &str = "----PixmillTestBoundary7MA4YWxkTrZu0gW";

pub fn test_app() -> Router {
    pixmill::app(Arc::new(AppState::new(Config::default())))
}

/// One file part of a multipart body.
pub struct Upload {
    pub field: &'static str,
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(field: &'static str, filename: &str, content_type: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            field,
            filename: filename.to_string(),
            content_type,
            bytes,
        }
    }
}

pub fn multipart_body(uploads: &[Upload], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();

    for upload in uploads {
        write!(body, "--{}\r\n", BOUNDARY).unwrap();
        write!(
            body,
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            upload.field, upload.filename
        )
        .unwrap();
        write!(body, "Content-Type: {}\r\n\r\n", upload.content_type).unwrap();
        body.extend_from_slice(&upload.bytes);
        write!(body, "\r\n").unwrap();
    }

    for (name, value) in fields {
        write!(body, "--{}\r\n", BOUNDARY).unwrap();
        write!(body, "Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).unwrap();
        write!(body, "{}\r\n", value).unwrap();
    }

    write!(body, "--{}--\r\n", BOUNDARY).unwrap();
    body
}

pub fn multipart_request(uri: &str, uploads: &[Upload], fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(uploads, fields)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn picture(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    picture(width, height).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn jpeg_upload(field: &'static str, name: &str, width: u32, height: u32) -> Upload {
    Upload::new(field, name, "image/jpeg", encode(width, height, ImageFormat::Jpeg))
}

pub fn png_upload(field: &'static str, name: &str, width: u32, height: u32) -> Upload {
    Upload::new(field, name, "image/png", encode(width, height, ImageFormat::Png))
}

pub fn corrupt_upload(field: &'static str, name: &str) -> Upload {
    let png = encode(64, 64, ImageFormat::Png);
    Upload::new(field, name, "image/png", png[..png.len() / 3].to_vec())
}

/// A PDF with `pages` US Letter pages.
pub fn letter_pdf(pages: usize) -> Vec<u8> {
    let jpeg = encode(8, 8, ImageFormat::Jpeg);
    let mut builder = PdfBuilder::new();
    for _ in 0..pages {
        let image = EmbeddedImage {
            jpeg: jpeg.clone(),
            width: 8,
            height: 8,
            components: 3,
        };
        builder
            .add_image_page(
                &image,
                PageBox {
                    width: 612.0,
                    height: 792.0,
                },
                Placement {
                    x: 100.0,
                    y: 100.0,
                    width: 8.0,
                    height: 8.0,
                },
            )
            .unwrap();
    }
    builder.serialize().unwrap()
}

/// Payload of a `data:` URL.
pub fn decode_data_url(url: &str) -> Vec<u8> {
    let (_, payload) = url.split_once(";base64,").expect("data URL");
    STANDARD.decode(payload).unwrap()
}
