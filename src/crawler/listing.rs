//! Listing stage: catalog pages to detail links
//!
//! This stage walks the paginated catalog and collects the deduplicated set
//! of detail-page links:
//! - page count comes from the pagination widget (or an override)
//! - pages are fetched batch by batch, each batch's fetches concurrent
//! - every page unit returns its own link list; the pool merge is a
//!   single-writer step between batches, so concurrent units never share
//!   mutable state
//! - a page lost to retry exhaustion contributes an empty link set; holes in
//!   the pagination are tolerated, a malformed pagination widget is not

use crate::crawler::batching::{BatchRunner, CrawlRange};
use crate::crawler::extract;
use crate::crawler::fetcher::Fetcher;
use crate::{AutolotError, Result};
use scraper::Html;
use std::collections::HashSet;

/// Discovers detail links across the paginated catalog
pub struct ListingStage<'a> {
    fetcher: &'a Fetcher,
    root_url: String,
    batch_size: usize,
    pages_limit: Option<usize>,
}

impl<'a> ListingStage<'a> {
    /// Creates a listing stage
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Retry-wrapped HTTP operations
    /// * `root_url` - First catalog page; page N is `<root_url>?page=N`
    /// * `batch_size` - Pages fetched concurrently per batch
    /// * `pages_limit` - Page-count override for bounded runs and tests
    pub fn new(
        fetcher: &'a Fetcher,
        root_url: impl Into<String>,
        batch_size: usize,
        pages_limit: Option<usize>,
    ) -> Self {
        Self {
            fetcher,
            root_url: root_url.into(),
            batch_size,
            pages_limit,
        }
    }

    /// Runs the stage to completion and returns the deduplicated link list
    ///
    /// Links keep their discovery order. The returned collection is the
    /// exclusion-filtered link pool; the stage owns the pool exclusively
    /// while it runs and hands it over here.
    pub async fn collect_links(&self) -> Result<Vec<String>> {
        let total_pages = self.count_pages().await?;
        tracing::info!("pages discovered: {}", total_pages);

        let range = CrawlRange::new(1, total_pages + 1, self.batch_size)?;

        let mut pool = HashSet::new();
        let mut links = Vec::new();

        let mut runner = BatchRunner::new(range, |start, end| {
            (start..end)
                .map(|page| self.page_links(format!("{}?page={}", self.root_url, page)))
                .collect()
        });

        while let Some(batch) = runner.next_batch().await {
            for found in batch {
                for link in found {
                    if pool.insert(link.clone()) {
                        links.push(link);
                    }
                }
            }
            tracing::debug!("urls obtained: {}", pool.len());
        }

        tracing::info!("listing completed, total urls: {}", links.len());

        Ok(links)
    }

    /// Resolves the total page count
    ///
    /// An override is used verbatim when present; otherwise the root page is
    /// fetched and the count parsed out of the pagination widget. A widget
    /// that cannot be parsed fails the whole stage.
    async fn count_pages(&self) -> Result<usize> {
        if let Some(limit) = self.pages_limit {
            return Ok(limit);
        }

        let body = self.fetcher.fetch_document(&self.root_url).await?;
        let document = Html::parse_document(&body);

        extract::pagination_total(&document)
            .map_err(|reason| AutolotError::Pagination(reason.to_string()))
    }

    /// Fetches one listing page and extracts its item links
    ///
    /// Retry exhaustion degrades to an empty link set for this page.
    async fn page_links(&self, url: String) -> Vec<String> {
        match self.fetcher.fetch_document(&url).await {
            Ok(body) => {
                let document = Html::parse_document(&body);
                extract::listing_links(&document)
            }
            Err(reason) => {
                tracing::warn!("listing page skipped, url: {}, reason: \"{}\"", url, reason);
                Vec::new()
            }
        }
    }
}
