//! Storage module for persisting scraped records
//!
//! This module handles the persistence side of the pipeline:
//! - The [`ItemRecord`] output entity
//! - The [`ItemSink`] trait the pipeline writes through
//! - SQLite schema management and the rusqlite-backed store

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{ItemSink, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// One fully-assembled car listing
///
/// Created once per successfully-extracted detail page and immutable from
/// then on; the sink takes ownership of persistence. A record is either
/// complete or it does not exist; only the phone number, plate number and
/// VIN are legitimately optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    /// Detail-page URL, doubling as the record identifier
    pub url: String,

    /// Car title, e.g. "BMW X5 2014"
    pub title: String,

    /// Price in USD
    pub price_usd: i64,

    /// Odometer reading in kilometers
    pub odometer_km: i64,

    /// Seller's display name
    pub seller_name: String,

    /// Seller's phone number with national prefix, when the lookup succeeded
    pub phone_number: Option<String>,

    /// State-issued plate number, when published
    pub plate_number: Option<String>,

    /// Vehicle identification number, when published
    pub vin: Option<String>,

    /// Primary gallery image URL
    pub image_url: String,

    /// Number of images in the gallery
    pub images_count: i64,

    /// Discovery timestamp
    pub found_at: DateTime<Utc>,
}
