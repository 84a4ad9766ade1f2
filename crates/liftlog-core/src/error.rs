//! Error types for `liftlog-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::sync::EntityType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: EntityType, id: Uuid },

  #[error("outbox entry not found: {0}")]
  OutboxEntryNotFound(Uuid),

  /// No live user matches the given mail/password pair.
  #[error("user not found; sign up offline or sync existing data first")]
  InvalidCredentials,

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
