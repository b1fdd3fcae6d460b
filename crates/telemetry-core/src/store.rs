//! Record storage
//!
//! [`RecordStore`] is the persistence contract the ingestion path depends on;
//! [`SqliteRecordStore`] implements it on a single SQLite table.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{NewRecord, ProcessedRecord};

/// Durable table of processed telemetry rows
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all rows atomically, returning one generated id per row in input order
    async fn create(&self, rows: Vec<NewRecord>) -> Result<Vec<i64>>;

    /// Fetch one record
    async fn get(&self, id: i64) -> Result<ProcessedRecord>;

    /// Fetch every record, ordered by id
    async fn list(&self) -> Result<Vec<ProcessedRecord>>;

    /// Replace the mutable fields of a record and return the stored result
    async fn update(&self, id: i64, fields: NewRecord) -> Result<ProcessedRecord>;

    /// Remove a record, returning its last stored value
    async fn delete(&self, id: i64) -> Result<ProcessedRecord>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processed_agent_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    road_state TEXT NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, road_state, x, y, z, latitude, longitude, timestamp FROM processed_agent_data";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedRecord> {
    Ok(ProcessedRecord {
        id: row.get(0)?,
        road_state: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        z: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

fn select_one(conn: &Connection, id: i64) -> Result<Option<ProcessedRecord>> {
    let record = conn
        .query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// SQLite-backed record store
///
/// The connection is shared behind a mutex and every call runs on the
/// blocking pool, so async callers are suspended rather than blocked.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::init(conn)
    }

    /// Open a store from a connection address
    ///
    /// Accepts a plain path, a `sqlite://` URL, or `:memory:`.
    pub fn connect(url: &str) -> Result<Self> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        if path.is_empty() {
            return Err(Error::Storage("Empty database address".to_string()));
        }
        if path == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(path)
        }
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Storage(format!("Storage task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, rows: Vec<NewRecord>) -> Result<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(rows.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO processed_agent_data
                        (road_state, x, y, z, latitude, longitude, timestamp)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.road_state,
                        row.x,
                        row.y,
                        row.z,
                        row.latitude,
                        row.longitude,
                        row.timestamp,
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;

            tracing::debug!(count = ids.len(), "Inserted telemetry rows");
            Ok(ids)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<ProcessedRecord> {
        self.with_conn(move |conn| select_one(conn, id)?.ok_or(Error::NotFound(id)))
            .await
    }

    async fn list(&self) -> Result<Vec<ProcessedRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
            let records = stmt
                .query_map([], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn update(&self, id: i64, fields: NewRecord) -> Result<ProcessedRecord> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE processed_agent_data
                 SET road_state = ?, x = ?, y = ?, z = ?, latitude = ?, longitude = ?, timestamp = ?
                 WHERE id = ?",
                params![
                    fields.road_state,
                    fields.x,
                    fields.y,
                    fields.z,
                    fields.latitude,
                    fields.longitude,
                    fields.timestamp,
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(Error::NotFound(id));
            }
            let record = select_one(&tx, id)?.ok_or(Error::NotFound(id))?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<ProcessedRecord> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let record = select_one(&tx, id)?.ok_or(Error::NotFound(id))?;
            tx.execute("DELETE FROM processed_agent_data WHERE id = ?", params![id])?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }
}
