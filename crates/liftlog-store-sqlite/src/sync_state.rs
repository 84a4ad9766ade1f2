//! [`SqliteSyncState`]: the sync driver's key/value progress markers.

use liftlog_core::repository::SyncStateStore;
use rusqlite::OptionalExtension as _;

use crate::{database::Database, Error, Result};

#[derive(Clone)]
pub struct SqliteSyncState {
  db: Database,
}

impl SqliteSyncState {
  pub fn new(db: Database) -> Self { Self { db } }
}

impl SyncStateStore for SqliteSyncState {
  type Error = Error;

  async fn get(&self, key: String) -> Result<Option<String>> {
    self
      .db
      .read(move |conn| {
        let value: Option<Option<String>> = conn
          .query_row(
            "SELECT value FROM sync_state WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
          )
          .optional()?;
        Ok(value.flatten())
      })
      .await
  }

  async fn set(&self, key: String, value: Option<String>) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| {
        tx.execute(
          "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?1, ?2)",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await
  }
}
