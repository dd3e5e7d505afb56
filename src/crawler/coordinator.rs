//! Pipeline coordination
//!
//! Wires the two stages to the persistence sink: the listing stage runs to
//! completion and hands over its link pool, then the detail stage streams
//! batches of per-link results. Absent entries are dropped here, when the
//! persistence batches are assembled, and the survivors go to the sink.
//!
//! Sink failures are logged and absorbed; a lost batch never aborts the
//! crawl (delivery is at-least-once, not exactly-once).

use crate::config::Config;
use crate::crawler::detail::DetailStage;
use crate::crawler::fetcher::{Fetcher, RetryPolicy};
use crate::crawler::listing::ListingStage;
use crate::storage::{ItemRecord, ItemSink, SqliteStore};
use crate::Result;
use futures::StreamExt;
use std::path::Path;

/// The full listing → detail → sink pipeline
pub struct Pipeline<S> {
    config: Config,
    fetcher: Fetcher,
    sink: S,
}

impl<S: ItemSink> Pipeline<S> {
    /// Creates a pipeline over the given sink
    pub fn new(config: Config, sink: S) -> Result<Self> {
        let policy = RetryPolicy::from_config(&config.http);
        let fetcher = Fetcher::new(policy)?;

        Ok(Self {
            config,
            fetcher,
            sink,
        })
    }

    /// Runs both stages to completion
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The declared ranges were fully processed (individual
    ///   cars may still have been skipped)
    /// * `Err(AutolotError)` - A validation failure: bad range, malformed
    ///   pagination, or a configuration problem
    pub async fn run(&mut self) -> Result<()> {
        let scraper = &self.config.scraper;

        let listing = ListingStage::new(
            &self.fetcher,
            scraper.root_url.clone(),
            scraper.batch_size,
            scraper.pages_limit,
        );
        let links = listing.collect_links().await?;

        if links.is_empty() {
            tracing::info!("no links discovered, nothing to scrape");
            return Ok(());
        }

        let total_links = links.len();
        let detail = DetailStage::new(
            &self.fetcher,
            scraper.phone_url.clone(),
            links,
            scraper.batch_size,
        );

        let batches = detail.batches()?;
        futures::pin_mut!(batches);

        let mut saved = 0usize;
        let mut skipped = 0usize;

        while let Some(batch) = batches.next().await {
            let unit_count = batch.len();
            let records: Vec<ItemRecord> = batch.into_iter().flatten().collect();
            skipped += unit_count - records.len();

            tracing::info!(
                "batch completed, items: {}, skipped: {}",
                records.len(),
                unit_count - records.len()
            );

            if records.is_empty() {
                continue;
            }

            match self.sink.save_many(&records) {
                Ok(count) => saved += count,
                Err(reason) => {
                    tracing::error!("sink rejected batch, reason: \"{}\"", reason);
                }
            }
        }

        tracing::info!(
            "scrape completed, links: {}, saved: {}, skipped: {}",
            total_links,
            saved,
            skipped
        );

        Ok(())
    }
}

/// Runs the full pipeline against the configured SQLite sink
///
/// This is the main library entry point: opens the database, builds the
/// pipeline and drives it to completion.
pub async fn run_pipeline(config: Config) -> Result<()> {
    let sink = SqliteStore::open(Path::new(&config.output.database_path))?;
    let mut pipeline = Pipeline::new(config, sink)?;
    pipeline.run().await
}
