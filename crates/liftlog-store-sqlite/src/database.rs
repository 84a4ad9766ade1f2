//! [`Database`]: the single shared store handle and its transaction wrapper.
//!
//! The handle is opened lazily, at most once: concurrent first callers await
//! the same in-flight initialisation (open, pragmas, migrations) and receive
//! the same connection. All statements then run sequentially on the
//! connection's dedicated thread, so immediate-mode transactions are the only
//! concurrency control needed.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use rusqlite::{Transaction, TransactionBehavior};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{migrations, Result};

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
  File(PathBuf),
  Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
  pub location:     Location,
  /// How long a statement waits on a lock held by another process.
  pub busy_timeout: Duration,
}

impl DatabaseOptions {
  pub fn file(path: impl AsRef<Path>) -> Self {
    Self { location: Location::File(path.as_ref().to_path_buf()), ..Self::memory() }
  }

  pub fn memory() -> Self { Self { location: Location::Memory, busy_timeout: Duration::from_secs(5) } }
}

/// A lazily opened, migrated SQLite store.
///
/// Cloning is cheap and every clone shares the same underlying connection.
#[derive(Clone)]
pub struct Database {
  inner: Arc<Inner>,
}

struct Inner {
  options: DatabaseOptions,
  conn:    OnceCell<tokio_rusqlite::Connection>,
}

impl Database {
  /// Describe a store without touching the filesystem yet.
  pub fn new(options: DatabaseOptions) -> Self {
    Self { inner: Arc::new(Inner { options, conn: OnceCell::new() }) }
  }

  /// Create the handle and initialise it immediately, surfacing schema errors
  /// at startup.
  pub async fn open(options: DatabaseOptions) -> Result<Self> {
    let db = Self::new(options);
    db.connection().await?;
    Ok(db)
  }

  pub fn options(&self) -> &DatabaseOptions { &self.inner.options }

  /// The shared connection, opening and migrating it on first use.
  pub async fn connection(&self) -> Result<&tokio_rusqlite::Connection> {
    self.inner.conn.get_or_try_init(|| initialise(&self.inner.options)).await
  }

  /// Run `f` inside an immediate-mode transaction.
  ///
  /// Commits when `f` returns `Ok`; rolls back and returns the original error
  /// otherwise. Once started the transaction always runs to completion, even
  /// if the returned future is dropped. Nested calls are not supported: batch
  /// every write that must be atomic into one `f`.
  pub async fn run_in_transaction<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let conn = self.connection().await?;
    conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
          Ok(value) => {
            tx.commit()?;
            debug!("Transaction committed");
            Ok(Ok(value))
          }
          Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
              warn!(error = %rollback_err, "Rollback failed");
            }
            debug!(error = %err, "Transaction rolled back");
            Ok(Err(err))
          }
        }
      })
      .await?
  }

  /// Run read-only statements outside an explicit transaction.
  pub async fn read<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&rusqlite::Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let conn = self.connection().await?;
    conn.call(move |conn| Ok(f(conn))).await?
  }

  /// The schema version recorded in `metadata`.
  pub async fn schema_version(&self) -> Result<u32> {
    self.read(|conn| migrations::current_version(conn)).await
  }
}

async fn initialise(options: &DatabaseOptions) -> Result<tokio_rusqlite::Connection> {
  let conn = match &options.location {
    Location::File(path) => tokio_rusqlite::Connection::open(path).await?,
    Location::Memory => tokio_rusqlite::Connection::open_in_memory().await?,
  };

  let busy_timeout = options.busy_timeout;
  let version = conn
    .call(move |conn| {
      conn.busy_timeout(busy_timeout)?;
      conn.pragma_update(None, "foreign_keys", "ON")?;
      let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
      debug!(%journal_mode, "Connection configured");
      Ok(migrations::run(conn))
    })
    .await??;

  info!(version, location = ?options.location, "Database ready");
  Ok(conn)
}
