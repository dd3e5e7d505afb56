//! Autolot: a used-car catalog scraper
//!
//! This crate implements a two-stage scraper for the AutoRia used-car catalog:
//! a listing stage walks the paginated catalog and collects deduplicated links
//! to car detail pages, and a detail stage fetches every detail page (plus one
//! phone-lookup request per car) and persists the assembled records in batches.

pub mod config;
pub mod crawler;
pub mod storage;

use thiserror::Error;

/// Main error type for Autolot operations
#[derive(Debug, Error)]
pub enum AutolotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid crawl range: from = {from}, to = {to}")]
    InvalidRange { from: usize, to: usize },

    #[error("pagination widget parse failed: {0}")]
    Pagination(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Autolot operations
pub type Result<T> = std::result::Result<T, AutolotError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_pipeline, FetchError, RetryPolicy};
pub use storage::ItemRecord;
