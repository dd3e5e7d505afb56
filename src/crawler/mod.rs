//! Crawler module for the two-stage scrape pipeline
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with an explicit retry wrapper
//! - Batch scheduling over page and link ranges
//! - The listing stage (catalog pages to deduplicated detail links)
//! - The detail stage (links to assembled records)
//! - Field extraction from fetched documents
//! - Overall pipeline coordination

mod batching;
mod coordinator;
mod detail;
mod extract;
mod fetcher;
mod listing;

pub use batching::{BatchRunner, CrawlRange};
pub use coordinator::{run_pipeline, Pipeline};
pub use detail::DetailStage;
pub use extract::{DetailFields, ExtractError, PhoneQuery, EXCLUDED_SEGMENT};
pub use fetcher::{build_http_client, with_retry, FetchError, Fetcher, RetryPolicy};
pub use listing::ListingStage;
