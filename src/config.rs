//! Service configuration.
//!
//! Everything has a default; the environment can override the bind address,
//! the batch chunk size and the request body limit. Per-route limits are
//! fixed here so the `GET` capability routes can echo them.

use std::time::Duration;
use thiserror::Error;

const MB: usize = 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    NotAPositiveInteger { var: &'static str, value: String },
}

/// Limits applied to one route before and during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimits {
    pub max_files: usize,
    pub max_file_size: usize,
    /// Wall-clock bound for the whole request.
    pub max_duration: Duration,
}

impl RouteLimits {
    const fn new(max_files: usize, max_file_mb: usize, max_secs: u64) -> Self {
        Self {
            max_files,
            max_file_size: max_file_mb * MB,
            max_duration: Duration::from_secs(max_secs),
        }
    }

    pub fn max_file_size_mb(&self) -> usize {
        self.max_file_size / MB
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    /// Items processed concurrently per chunk.
    pub batch_concurrency: usize,
    pub max_request_bytes: usize,
    pub max_pdf_pages: usize,
    pub convert: RouteLimits,
    pub image_to_pdf: RouteLimits,
    pub pdf_to_image: RouteLimits,
    pub icon: RouteLimits,
    /// Shared by compress, resize, crop and rotate.
    pub edit: RouteLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            batch_concurrency: 5,
            max_request_bytes: 1024 * MB,
            max_pdf_pages: 50,
            convert: RouteLimits::new(20, 50, 60),
            image_to_pdf: RouteLimits::new(30, 50, 120),
            pdf_to_image: RouteLimits::new(1, 100, 120),
            icon: RouteLimits::new(1, 4, 60),
            edit: RouteLimits::new(1, 100, 60),
        }
    }
}

impl Config {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("PIXMILL_ADDR").filter(|a| !a.trim().is_empty()) {
            config.addr = addr;
        }
        if let Some(n) = positive(&lookup, "PIXMILL_BATCH_CONCURRENCY")? {
            config.batch_concurrency = n;
        }
        if let Some(mb) = positive(&lookup, "PIXMILL_MAX_REQUEST_MB")? {
            config.max_request_bytes = mb.saturating_mul(MB);
        }

        Ok(config)
    }
}

fn positive<F>(lookup: &F, var: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::NotAPositiveInteger { var, value }),
    }
}
