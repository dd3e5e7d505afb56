use serde::Deserialize;

/// Main configuration structure for Autolot
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Catalog root URL, the first listing page
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Endpoint answering the phone-number lookup POST
    #[serde(rename = "phone-url")]
    pub phone_url: String,

    /// Number of pages/links processed concurrently per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Optional page-count override; skips the pagination-widget lookup
    #[serde(rename = "pages-limit", default)]
    pub pages_limit: Option<usize>,
}

/// HTTP client and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Total attempts per request, first try included
    #[serde(rename = "attempts-limit")]
    pub attempts_limit: u32,

    /// Delay between attempts (milliseconds)
    #[serde(rename = "attempt-delay-ms")]
    pub attempt_delay_ms: u64,

    /// Total per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
