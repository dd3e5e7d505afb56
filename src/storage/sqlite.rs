//! SQLite sink implementation

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ItemSink, StorageResult};
use crate::storage::ItemRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed persistence sink
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Counts all persisted records
    pub fn count_records(&self) -> StorageResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM cars", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Loads the most recently inserted record for a URL
    pub fn get_by_url(&self, url: &str) -> StorageResult<Option<ItemRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT url, title, price_usd, odometer_km, seller_name, phone_number,
                        plate_number, vin, image_url, images_count, found_at
                 FROM cars WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                params![url],
                |row| {
                    Ok(ItemRecord {
                        url: row.get(0)?,
                        title: row.get(1)?,
                        price_usd: row.get(2)?,
                        odometer_km: row.get(3)?,
                        seller_name: row.get(4)?,
                        phone_number: row.get(5)?,
                        plate_number: row.get(6)?,
                        vin: row.get(7)?,
                        image_url: row.get(8)?,
                        images_count: row.get(9)?,
                        found_at: parse_timestamp(row.get::<_, String>(10)?),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

/// Timestamps are stored as RFC 3339 text; an unreadable one falls back to
/// the epoch rather than failing the row
fn parse_timestamp(text: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_default()
}

impl ItemSink for SqliteStore {
    fn save_many(&mut self, records: &[ItemRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO cars (url, title, price_usd, odometer_km, seller_name,
                                   phone_number, plate_number, vin, image_url,
                                   images_count, found_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for record in records {
                stmt.execute(params![
                    record.url,
                    record.title,
                    record.price_usd,
                    record.odometer_km,
                    record.seller_name,
                    record.phone_number,
                    record.plate_number,
                    record.vin,
                    record.image_url,
                    record.images_count,
                    record.found_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!("transaction succeeded, items: [{}]", records.len());

        Ok(records.len())
    }
}
