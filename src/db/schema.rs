//! Journal storage layout and connection setup.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const EVENTS_TABLE: &str = "protocol_events";

const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS protocol_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_key TEXT NOT NULL UNIQUE,
    tx_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    label TEXT NOT NULL,
    kind TEXT NOT NULL,
    vault TEXT,
    owner TEXT,
    block_time INTEGER NOT NULL,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// Secondary indexes the read queries rely on: (name, indexed columns).
pub const JOURNAL_INDEXES: [(&str, &str); 3] = [
    ("idx_protocol_events_vault", "vault, id"),
    ("idx_protocol_events_owner", "owner, id"),
    ("idx_protocol_events_tx", "tx_id, seq"),
];

/// Connect to the journal file at `db_path`, creating it and its directory
/// when missing.
pub async fn connect(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Create the events table and its indexes in one transaction.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(CREATE_EVENTS_TABLE).execute(&mut *tx).await?;
    for (name, columns) in JOURNAL_INDEXES {
        let ddl = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            name, EVENTS_TABLE, columns
        );
        sqlx::query(&ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!(table = EVENTS_TABLE, indexes = JOURNAL_INDEXES.len(), "journal schema ready");
    Ok(())
}

/// Names of expected journal indexes that are absent from the database.
pub async fn missing_indexes(pool: &SqlitePool) -> Result<Vec<&'static str>, sqlx::Error> {
    let present: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?")
            .bind(EVENTS_TABLE)
            .fetch_all(pool)
            .await?;

    Ok(JOURNAL_INDEXES
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !present.iter().any(|(p,)| p.as_str() == *name))
        .collect())
}
