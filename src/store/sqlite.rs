//! File-backed consent storage.
//!
//! A single sqlite table keyed by client identity. Operations are tiny
//! single-row statements executed behind a mutex; read failures degrade
//! to "no consent" and write failures are logged and dropped.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::store::ConsentStore;

/// Error raised only at open time; runtime failures never propagate.
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
    #[error("failed to create storage directory: {0}")]
    CreateDir(std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Durable `ConsentStore` backed by a local sqlite file.
pub struct SqliteConsentStore {
    conn: Mutex<Connection>,
}

impl SqliteConsentStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SqliteError::CreateDir)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS consented (client_id TEXT PRIMARY KEY)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ConsentStore for SqliteConsentStore {
    async fn has_consent(&self, client: Uuid) -> bool {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let result = conn.query_row(
            "SELECT 1 FROM consented WHERE client_id = ?1 LIMIT 1",
            params![client.to_string()],
            |_| Ok(()),
        );
        match result {
            Ok(()) => true,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(error) => {
                tracing::warn!(%client, %error, "failed to read consent from sqlite");
                false
            }
        }
    }

    async fn set_consent(&self, client: Uuid, consented: bool) {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let result = if consented {
            conn.execute(
                "INSERT OR IGNORE INTO consented (client_id) VALUES (?1)",
                params![client.to_string()],
            )
        } else {
            conn.execute(
                "DELETE FROM consented WHERE client_id = ?1",
                params![client.to_string()],
            )
        };
        if let Err(error) = result {
            tracing::warn!(%client, %error, "failed to write consent to sqlite");
        }
    }
}
