// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and migrations.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};
use zapflow_core::ZapflowError;

/// Path value selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Convert a tokio-rusqlite error into `ZapflowError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ZapflowError {
    ZapflowError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Cloning is cheap; every clone talks to the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path`, apply PRAGMAs and
    /// run pending migrations.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, ZapflowError> {
        let conn = if path == IN_MEMORY {
            tokio_rusqlite::Connection::open_in_memory().await
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(ZapflowError::storage)?;
            }
            tokio_rusqlite::Connection::open(path).await
        }
        .map_err(|e| ZapflowError::Storage {
            source: Box::new(e),
        })?;

        let journal_mode = conn
            .call(|conn| -> Result<String, rusqlite::Error> {
                let mode = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.busy_timeout(Duration::from_secs(5))?;
                Ok(mode)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path, journal_mode = %journal_mode, "database pragmas applied");

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| ZapflowError::Storage {
                source: e.to_string().into(),
            })?;

        info!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection (the single writer).
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<(), ZapflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ZapflowError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_directories_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/data/zapflow.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for table in ["instances", "messages", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zapflow.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.ping().await.unwrap();
        db.checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_database_works() {
        let db = Database::open(IN_MEMORY).await.unwrap();
        db.ping().await.unwrap();
    }
}
