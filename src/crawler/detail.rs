//! Detail stage: links to assembled records
//!
//! For every discovered link this stage fetches the detail page, extracts
//! the car fields, resolves the seller's phone number through the secondary
//! lookup endpoint, and assembles an [`ItemRecord`]. Work is batched over
//! the link collection's index range; each yielded batch holds one entry per
//! link, with `None` wherever the car was skipped or failed.
//!
//! The stage never drops the `None` entries itself; assembling persistence
//! batches is the caller's job.

use crate::crawler::batching::{BatchRunner, CrawlRange};
use crate::crawler::extract::{self, PhoneQuery};
use crate::crawler::fetcher::Fetcher;
use crate::storage::ItemRecord;
use crate::Result;
use chrono::Utc;
use futures::Stream;
use scraper::Html;

/// Scrapes every link of the listing stage's output
pub struct DetailStage<'a> {
    fetcher: &'a Fetcher,
    phone_url: String,
    links: Vec<String>,
    batch_size: usize,
}

impl<'a> DetailStage<'a> {
    /// Creates a detail stage
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Retry-wrapped HTTP operations
    /// * `phone_url` - Secondary endpoint answering the phone lookup POST
    /// * `links` - Detail links to process; must not be empty
    /// * `batch_size` - Links processed concurrently per batch
    pub fn new(
        fetcher: &'a Fetcher,
        phone_url: impl Into<String>,
        links: Vec<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            fetcher,
            phone_url: phone_url.into(),
            links,
            batch_size,
        }
    }

    /// Streams batches of per-link results
    ///
    /// Batches are produced strictly sequentially; within a batch all links
    /// are fetched concurrently and results keep the link order. The stream
    /// is finite and consumed exactly once per stage run.
    ///
    /// # Returns
    ///
    /// * `Ok(stream)` - One `Vec<Option<ItemRecord>>` per batch
    /// * `Err(AutolotError::InvalidRange)` - The link collection is empty
    pub fn batches(&'a self) -> Result<impl Stream<Item = Vec<Option<ItemRecord>>> + 'a> {
        let range = CrawlRange::new(0, self.links.len(), self.batch_size)?;

        let runner = BatchRunner::new(range, move |start, end| {
            self.links[start..end]
                .iter()
                .map(|link| self.scrape_one(link))
                .collect()
        });

        Ok(futures::stream::unfold(runner, |mut runner| async move {
            let batch = runner.next_batch().await?;
            Some((batch, runner))
        }))
    }

    /// Processes one detail link into a record, or nothing
    ///
    /// Every failure path short-circuits to `None` without affecting the
    /// rest of the batch: retry exhaustion on the fetch, the "not yet
    /// published" marker (which also suppresses the phone lookup), and any
    /// extraction failure.
    async fn scrape_one(&self, url: &str) -> Option<ItemRecord> {
        let body = match self.fetcher.fetch_document(url).await {
            Ok(body) => body,
            Err(reason) => {
                tracing::warn!("detail page skipped, url: {}, reason: \"{}\"", url, reason);
                return None;
            }
        };

        // parse and extract synchronously; the document is dropped before
        // the next suspension point
        let fields = {
            let document = Html::parse_document(&body);

            if extract::is_unavailable(&document) {
                tracing::info!("data unavailable, skipping: {}", url);
                return None;
            }

            match extract::detail_fields(&document, &body) {
                Ok(fields) => fields,
                Err(reason) => {
                    tracing::warn!("extraction failed, url: {}, reason: \"{}\"", url, reason);
                    return None;
                }
            }
        };

        let phone_number = match &fields.phone_query {
            Some(query) => self.resolve_phone(query).await,
            None => {
                tracing::info!("phone lookup skipped, ids missing: {}", url);
                None
            }
        };

        let record = ItemRecord {
            url: url.to_string(),
            title: fields.title,
            price_usd: fields.price_usd,
            odometer_km: fields.odometer_km,
            seller_name: fields.seller_name,
            phone_number,
            plate_number: fields.plate_number,
            vin: fields.vin,
            image_url: fields.image_url,
            images_count: fields.images_count,
            found_at: Utc::now(),
        };

        tracing::info!("received: {:?}", record);

        Some(record)
    }

    /// Resolves the seller's phone number via the secondary endpoint
    ///
    /// Request body shape:
    ///
    /// ```json
    /// {
    ///   "autoId": 38330999,
    ///   "blockId": "autoPhone",
    ///   "data": [["userId", "4745906"], ["phoneId", "682365827"]]
    /// }
    /// ```
    ///
    /// A failed lookup or a response without the expected key leaves the
    /// phone number absent; the record is persisted without it.
    async fn resolve_phone(&self, query: &PhoneQuery) -> Option<String> {
        let payload = serde_json::json!({
            "autoId": query.auto_id,
            "blockId": "autoPhone",
            "data": [["userId", &query.user_id], ["phoneId", &query.phone_id]],
        });

        let response = match self.fetcher.post_json(&self.phone_url, &payload).await {
            Ok(response) => response,
            Err(reason) => {
                tracing::warn!("phone lookup failed, reason: \"{}\"", reason);
                return None;
            }
        };

        let phone = extract::phone_from_response(&response);
        if phone.is_none() {
            tracing::info!("phone number missing in lookup response");
        }
        phone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::RetryPolicy;
    use futures::StreamExt;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        Fetcher::new(RetryPolicy {
            attempts_limit: 2,
            attempt_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    fn detail_body(title: &str, auto_id: u64) -> String {
        format!(
            r#"<html>
            <body data-auto-id="{auto_id}">
                <source type="image/webp" srcset="https://cdn.test/thumb.webp">
                <source type="image/webp" srcset="https://cdn.test/full.webp">
                <span class="count"><span class="mhide">з 12</span></span>
                <h1 class="head">{title}</h1>
                <div class="price_value"><strong>9 500 $</strong></div>
                <div class="base-information">89 тис. км</div>
                <div class="seller_info_name">Олена</div>
                <a class="popup-successful-call" data-value-id="111">call</a>
                <div data-owner-id="222"></div>
            </body>
            </html>"#
        )
    }

    fn unavailable_body() -> String {
        r#"<html><body><div class="notice_head">not published yet</div></body></html>"#.to_string()
    }

    #[tokio::test]
    async fn test_record_assembly_with_phone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/car1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("BMW X5", 42)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/phone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"additionalParams": {"phoneStr": "(067) 123 4567"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let stage = DetailStage::new(
            &fetcher,
            format!("{}/phone", server.uri()),
            vec![format!("{}/car1", server.uri())],
            5,
        );

        let batches = stage.batches().unwrap();
        futures::pin_mut!(batches);
        let batch = batches.next().await.unwrap();
        assert!(batches.next().await.is_none());

        assert_eq!(batch.len(), 1);
        let record = batch[0].as_ref().unwrap();
        assert_eq!(record.title, "BMW X5");
        assert_eq!(record.price_usd, 9500);
        assert_eq!(record.odometer_km, 89000);
        assert_eq!(record.seller_name, "Олена");
        assert_eq!(record.phone_number, Some("380671234567".to_string()));
        assert_eq!(record.images_count, 12);
    }

    #[tokio::test]
    async fn test_unavailable_page_skips_phone_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/car1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(unavailable_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/phone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let stage = DetailStage::new(
            &fetcher,
            format!("{}/phone", server.uri()),
            vec![format!("{}/car1", server.uri())],
            5,
        );

        let batches = stage.batches().unwrap();
        futures::pin_mut!(batches);
        let batch = batches.next().await.unwrap();

        assert_eq!(batch, vec![None]);
    }

    #[tokio::test]
    async fn test_missing_phone_key_keeps_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/car1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("Audi A6", 7)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/phone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let stage = DetailStage::new(
            &fetcher,
            format!("{}/phone", server.uri()),
            vec![format!("{}/car1", server.uri())],
            5,
        );

        let batches = stage.batches().unwrap();
        futures::pin_mut!(batches);
        let batch = batches.next().await.unwrap();

        let record = batch[0].as_ref().unwrap();
        assert_eq!(record.title, "Audi A6");
        assert_eq!(record.phone_number, None);
    }

    #[tokio::test]
    async fn test_failed_link_yields_absent_slot_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("Skoda", 9)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/phone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"additionalParams": {"phoneStr": "(067) 000 0000"}}),
            ))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let stage = DetailStage::new(
            &fetcher,
            format!("{}/phone", server.uri()),
            vec![
                format!("{}/gone", server.uri()),
                format!("{}/ok", server.uri()),
            ],
            5,
        );

        let batches = stage.batches().unwrap();
        futures::pin_mut!(batches);
        let batch = batches.next().await.unwrap();

        assert_eq!(batch.len(), 2);
        assert!(batch[0].is_none());
        assert_eq!(batch[1].as_ref().unwrap().title, "Skoda");
    }

    #[tokio::test]
    async fn test_empty_link_collection_is_invalid() {
        let fetcher = test_fetcher();
        let stage = DetailStage::new(&fetcher, "http://localhost/phone", Vec::new(), 5);
        assert!(stage.batches().is_err());
    }
}
