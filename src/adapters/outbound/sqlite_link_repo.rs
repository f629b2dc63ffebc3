//! SQLite Link Repository
//!
//! Implements LinkRepository using SQLite for storage.
//! Each operation runs in its own transaction on a blocking thread.

use crate::domain::entities::{AccessTrace, Link, TracePatch};
use crate::domain::ports::{LinkRepository, StoreError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS links (
    id          TEXT PRIMARY KEY,
    target_url  TEXT NOT NULL,
    masked_url  TEXT,
    template    TEXT,
    created_at  TEXT NOT NULL,
    created_by  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS traces (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id     TEXT NOT NULL REFERENCES links(id),
    access_id   TEXT NOT NULL,
    data        TEXT NOT NULL,
    UNIQUE (link_id, access_id)
);
";

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// SQLite-backed link repository.
///
/// Traces are stored as JSON documents keyed by `(link_id, access_id)`.
/// The connection is shared behind a mutex, so operations are serialized;
/// every read-modify-write happens inside one transaction.
pub struct SqliteLinkRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLinkRepository {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection on a blocking thread.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("spawn_blocking error: {}", e)))?
    }

    /// Convert a SQLite row to a Link entity.
    fn row_to_link(row: &Row) -> rusqlite::Result<Link> {
        let created_at: String = row.get(4)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Link {
            id: row.get(0)?,
            target_url: row.get(1)?,
            masked_url: row.get(2)?,
            template: row.get(3)?,
            created_at,
            created_by: row.get(5)?,
        })
    }

    fn link_exists(conn: &Connection, link_id: &str) -> Result<bool, StoreError> {
        conn.query_row("SELECT 1 FROM links WHERE id = ?1", params![link_id], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
            .map_err(db_err)
    }
}

#[async_trait]
impl LinkRepository for SqliteLinkRepository {
    async fn get(&self, link_id: &str) -> Result<Option<Link>, StoreError> {
        let link_id = link_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, target_url, masked_url, template, created_at, created_by
                 FROM links WHERE id = ?1",
                params![link_id],
                Self::row_to_link,
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }

    async fn put(&self, link: Link) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO links (id, target_url, masked_url, template, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    target_url = excluded.target_url,
                    masked_url = excluded.masked_url,
                    template = excluded.template,
                    created_at = excluded.created_at,
                    created_by = excluded.created_by",
                params![
                    link.id,
                    link.target_url,
                    link.masked_url,
                    link.template,
                    link.created_at.to_rfc3339(),
                    link.created_by,
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Link>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, target_url, masked_url, template, created_at, created_by
                     FROM links ORDER BY created_at, id",
                )
                .map_err(db_err)?;
            let links = stmt
                .query_map([], Self::row_to_link)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            Ok(links)
        })
        .await
    }

    async fn append_trace(&self, link_id: &str, trace: AccessTrace) -> Result<(), StoreError> {
        let link_id = link_id.to_string();
        let data = serde_json::to_string(&trace).map_err(db_err)?;
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            if !Self::link_exists(&tx, &link_id)? {
                return Err(StoreError::LinkNotFound(link_id));
            }
            tx.execute(
                "INSERT INTO traces (link_id, access_id, data) VALUES (?1, ?2, ?3)",
                params![link_id, trace.access_id, data],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)
        })
        .await
    }

    async fn update_trace(
        &self,
        link_id: &str,
        access_id: &str,
        patch: TracePatch,
    ) -> Result<bool, StoreError> {
        let link_id = link_id.to_string();
        let access_id = access_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            if !Self::link_exists(&tx, &link_id)? {
                return Err(StoreError::LinkNotFound(link_id));
            }

            let data: Option<String> = tx
                .query_row(
                    "SELECT data FROM traces WHERE link_id = ?1 AND access_id = ?2",
                    params![link_id, access_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            let Some(data) = data else {
                return Ok(false);
            };

            let mut trace: AccessTrace = serde_json::from_str(&data).map_err(db_err)?;
            trace.apply(&patch);
            let data = serde_json::to_string(&trace).map_err(db_err)?;

            tx.execute(
                "UPDATE traces SET data = ?1 WHERE link_id = ?2 AND access_id = ?3",
                params![data, link_id, access_id],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            Ok(true)
        })
        .await
    }

    async fn traces(&self, link_id: &str) -> Result<Vec<AccessTrace>, StoreError> {
        let link_id = link_id.to_string();
        self.with_conn(move |conn| {
            if !Self::link_exists(conn, &link_id)? {
                return Err(StoreError::LinkNotFound(link_id));
            }
            let mut stmt = conn
                .prepare("SELECT data FROM traces WHERE link_id = ?1 ORDER BY seq")
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![link_id], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;

            rows.iter()
                .map(|data| serde_json::from_str(data).map_err(db_err))
                .collect()
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(db_err)
        })
        .await
    }
}
