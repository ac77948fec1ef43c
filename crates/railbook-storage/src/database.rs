// SPDX-FileCopyrightText: 2026 Railbook Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use railbook_core::RailbookError;
use tracing::{debug, info};

use crate::migrations;

/// Handle to the Railbook SQLite database.
///
/// Cloning is cheap; every clone talks to the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and apply migrations.
    pub async fn open(path: &str) -> Result<Self, RailbookError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RailbookError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| RailbookError::Storage {
                source: Box::new(e),
            })?;

        conn.call(move |conn| {
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal};
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;"
            ))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let applied = conn
            .call(|conn| Ok(migrations::run_migrations(conn).map_err(|e| e.to_string())))
            .await
            .map_err(map_tr_err)?
            .map_err(|e| RailbookError::Storage {
                source: format!("migration failed: {e}").into(),
            })?;

        info!(path, applied, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), RailbookError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| RailbookError::Storage {
            source: format!("close failed: {e}").into(),
        })?;
        debug!("database closed");
        Ok(())
    }
}

/// Wrap a tokio-rusqlite failure as a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RailbookError {
    RailbookError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .map_err(map_tr_err)
            .unwrap();

        for expected in [
            "chart_states",
            "passengers",
            "reservations",
            "route_stops",
            "trains",
            "urgent_override",
            "urgent_windows",
            "waitlist",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn open_in_missing_directory_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("rail.db");
        let result = Database::open(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(RailbookError::Storage { .. })));
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("fk.db").to_str().unwrap())
            .await
            .unwrap();
        let result = db
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO route_stops (train_id, station, sequence, distance_km)
                     VALUES ('none', 'X', 1, 0.0)",
                    [],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err);
        assert!(result.is_err());
    }
}
