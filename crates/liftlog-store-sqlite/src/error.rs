//! Error type for `liftlog-store-sqlite`.

use liftlog_core::sync::EntityType;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] liftlog_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt metadata: {0}")]
  Metadata(String),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  /// A schema upgrade failed. Fatal at startup; the store stays at the last
  /// fully applied version.
  #[error("migration {version} ({name}) failed: {source}")]
  Migration {
    version: u32,
    name:    &'static str,
    #[source]
    source:  rusqlite::Error,
  },
}

impl Error {
  pub fn not_found(entity: EntityType, id: Uuid) -> Self {
    Self::Core(liftlog_core::Error::NotFound { entity, id })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::Core(liftlog_core::Error::NotFound { .. } | liftlog_core::Error::OutboxEntryNotFound(_))
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
