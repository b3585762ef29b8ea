//! Multipart form collection.
//!
//! The whole form is read before validation starts, so validation can check
//! its constraints in a fixed order regardless of field order on the wire.

use crate::batch::BatchItem;
use crate::error::{AppError, Result};
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Field names that carry uploaded files.
const FILE_FIELDS: &[&str] = &["file", "files"];

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    pub name: String,
    pub content: Bytes,
    /// Declared media type, from the part header or guessed from the name.
    pub media_type: String,
}

impl InputItem {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>, media_type: Option<&str>) -> Self {
        let name = name.into();
        let media_type = match media_type {
            Some(declared) if !declared.trim().is_empty() => declared.trim().to_ascii_lowercase(),
            _ => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        Self {
            name,
            content: content.into(),
            media_type,
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

impl BatchItem for InputItem {
    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Raw multipart form: uploaded files in order, plus text fields.
#[derive(Debug, Clone, Default)]
pub struct RawForm {
    pub files: Vec<InputItem>,
    fields: HashMap<String, String>,
}

impl RawForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = RawForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::InvalidRequest(format!("Failed to parse multipart data: {}", e))
        })? {
            let name = field.name().unwrap_or("").to_string();

            if FILE_FIELDS.contains(&name.as_str()) {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;

                debug!("Received file: {} ({} bytes)", filename, data.len());
                form.files
                    .push(InputItem::new(filename, data, content_type.as_deref()));
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Text field value, `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn with_file(mut self, item: InputItem) -> Self {
        self.files.push(item);
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}
