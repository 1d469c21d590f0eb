//! # ClickHouse archive
//!
//! Wide-column archival sink. Each post becomes one row keyed by its id,
//! with author, message and coordinates in their own columns and the write
//! time as a `DateTime64(3)`.

use async_trait::async_trait;
use clickhouse::{Client, Row};
use domains::{ArchiveRecord, ArchiveStore, StoreError};
use serde::Serialize;

#[derive(Debug, Row, Serialize)]
struct ArchiveRow {
    post_id: String,
    user: String,
    message: String,
    lat: f64,
    lon: f64,
    /// Milliseconds since the epoch; the column is `DateTime64(3)`.
    written_at: i64,
}

impl From<&ArchiveRecord> for ArchiveRow {
    fn from(record: &ArchiveRecord) -> Self {
        Self {
            post_id: record.row_key.clone(),
            user: record.user.clone(),
            message: record.message.clone(),
            lat: record.lat,
            lon: record.lon,
            written_at: record.written_at.timestamp_millis(),
        }
    }
}

pub struct ClickHouseArchive {
    client: Client,
    table: String,
}

fn ch_error(err: clickhouse::error::Error) -> StoreError {
    StoreError::unavailable(format!("clickhouse: {err}"))
}

impl ClickHouseArchive {
    pub fn new(url: &str, database: &str, table: &str) -> Self {
        let client = Client::default().with_url(url).with_database(database);
        Self {
            client,
            table: table.to_string(),
        }
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.client = self.client.with_user(user).with_password(password);
        self
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.client
            .query(&create_table_sql(&self.table))
            .execute()
            .await
            .map_err(ch_error)
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            post_id String,
            user String,
            message String,
            lat Float64,
            lon Float64,
            written_at DateTime64(3)
        ) ENGINE = MergeTree()
        ORDER BY (post_id, written_at)
        "#
    )
}

#[async_trait]
impl ArchiveStore for ClickHouseArchive {
    async fn archive(&self, record: &ArchiveRecord) -> Result<(), StoreError> {
        let row = ArchiveRow::from(record);
        let mut insert = self.client.insert::<ArchiveRow>(&self.table).map_err(ch_error)?;
        insert.write(&row).await.map_err(ch_error)?;
        insert.end().await.map_err(ch_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn row_carries_every_column() {
        let record = ArchiveRecord {
            row_key: "p1".into(),
            user: "alice".into(),
            message: "hello".into(),
            lat: 37.7,
            lon: -122.4,
            written_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };
        let row = ArchiveRow::from(&record);
        assert_eq!(row.post_id, "p1");
        assert_eq!(row.user, "alice");
        assert_eq!(row.written_at, 1_700_000_000_123);
    }

    #[test]
    fn schema_targets_configured_table() {
        let sql = create_table_sql("posts_archive");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS posts_archive"));
        assert!(sql.contains("written_at DateTime64(3)"));
    }
}
