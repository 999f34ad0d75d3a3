//! SQLite-backed title document store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::store::{TitleStore, TitleStoreError};
use super::types::{Episode, Season, Title, TitleKind};

/// Stores each title as one JSON document row.
pub struct SqliteTitleStore {
    conn: Mutex<Connection>,
}

impl SqliteTitleStore {
    /// Create a new store, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, TitleStoreError> {
        let conn = Connection::open(path).map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TitleStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TitleStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS titles (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| TitleStoreError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TitleStoreError> {
        self.conn
            .lock()
            .map_err(|_| TitleStoreError::Database("connection lock poisoned".to_string()))
    }

    /// Extract a JSON sub-document with `json_extract` and decode it.
    fn extract<T: DeserializeOwned>(
        &self,
        id: &str,
        json_path: &str,
    ) -> Result<Option<T>, TitleStoreError> {
        let conn = self.lock()?;
        let fragment: Option<Option<String>> = conn
            .query_row(
                "SELECT json_extract(document, ?) FROM titles WHERE id = ?",
                params![json_path, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        match fragment.flatten() {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| TitleStoreError::Serialization {
                    id: id.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

impl TitleStore for SqliteTitleStore {
    fn get(&self, id: &str) -> Result<Option<Title>, TitleStoreError> {
        let conn = self.lock()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM titles WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        document
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| TitleStoreError::Serialization {
                    id: id.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    fn put(&self, title: &Title) -> Result<(), TitleStoreError> {
        let document =
            serde_json::to_string(title).map_err(|e| TitleStoreError::Serialization {
                id: title.id.clone(),
                message: e.to_string(),
            })?;
        let kind = match title.kind {
            TitleKind::Movie(_) => "movie",
            TitleKind::TvShow(_) => "tv_show",
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO titles (id, kind, document, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind, document = excluded.document, updated_at = excluded.updated_at",
            params![title.id, kind, document, Utc::now().to_rfc3339()],
        )
        .map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, TitleStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM titles ORDER BY id")
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| TitleStoreError::Database(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Ok(ids)
    }

    fn get_season(&self, id: &str, season: u32) -> Result<Option<Season>, TitleStoreError> {
        self.extract(id, &format!("$.kind.seasons.\"{season}\""))
    }

    fn get_episode(
        &self,
        id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Option<Episode>, TitleStoreError> {
        self.extract(
            id,
            &format!("$.kind.seasons.\"{season}\".episodes.\"{episode}\""),
        )
    }
}
