//! Event journal repository.

use super::schema;
use crate::domain::{Address, EventRecord, ProtocolEvent, Timestamp};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Repository for journaled protocol events.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open the journal at `db_path` and bring its schema up to date.
    pub async fn open(db_path: &str) -> Result<Self, sqlx::Error> {
        let pool = schema::connect(db_path).await?;
        schema::ensure_schema(&pool).await?;
        Ok(Repository { pool })
    }

    /// Insert one event record idempotently.
    ///
    /// Returns `false` if a record with the same event key already exists.
    pub async fn insert_event(&self, record: &EventRecord) -> Result<bool, sqlx::Error> {
        let inserted = self.insert_events_batch(std::slice::from_ref(record)).await?;
        Ok(inserted > 0)
    }

    /// Insert records in a single transaction, in order.
    ///
    /// Returns the number of newly inserted records (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written then.
    pub async fn insert_events_batch(&self, records: &[EventRecord]) -> Result<usize, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for record in records {
            let payload = serde_json::to_string(&record.event)
                .map_err(|e| sqlx::Error::Protocol(format!("event payload: {}", e)))?;
            let result = sqlx::query(
                r#"
                INSERT INTO protocol_events (
                    event_key, tx_id, seq, label, kind, vault, owner,
                    block_time, payload, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_key) DO NOTHING
                "#,
            )
            .bind(record.event_key.as_str())
            .bind(record.tx_id.to_string())
            .bind(i64::from(record.seq))
            .bind(record.label.as_str())
            .bind(record.event.kind())
            .bind(record.event.vault().map(|a| a.to_hex()))
            .bind(record.event.owner().map(|a| a.to_hex()))
            .bind(record.block_time.as_secs())
            .bind(payload)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Events touching `vault`, oldest first.
    pub async fn query_events_by_vault(
        &self,
        vault: &Address,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT event_key, tx_id, seq, label, block_time, payload
            FROM protocol_events
            WHERE vault = ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(vault.to_hex())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_row).collect())
    }

    /// Events of positions owned by `owner`, oldest first.
    pub async fn query_events_by_owner(
        &self,
        owner: &Address,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT event_key, tx_id, seq, label, block_time, payload
            FROM protocol_events
            WHERE owner = ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(owner.to_hex())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(decode_row).collect())
    }

    pub async fn count_events(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM protocol_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Readiness check: the database answers and every journal index exists.
    pub async fn check_schema(&self) -> Result<(), sqlx::Error> {
        let missing = schema::missing_indexes(&self.pool).await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(sqlx::Error::Protocol(format!(
                "journal indexes missing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Rebuild a record from a row, skipping rows that no longer parse.
fn decode_row(row: &SqliteRow) -> Option<EventRecord> {
    let event_key: String = row.get("event_key");
    let tx_id: String = row.get("tx_id");
    let seq: i64 = row.get("seq");
    let label: String = row.get("label");
    let block_time: i64 = row.get("block_time");
    let payload: String = row.get("payload");

    let tx_id = match Uuid::from_str(&tx_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(%event_key, error = %e, "Skipping event with unparseable tx id");
            return None;
        }
    };
    let event: ProtocolEvent = match serde_json::from_str(&payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(%event_key, error = %e, "Skipping event with unparseable payload");
            return None;
        }
    };

    Some(EventRecord {
        event_key,
        tx_id,
        seq: u32::try_from(seq).unwrap_or_default(),
        label,
        block_time: Timestamp::new(block_time),
        event,
    })
}
