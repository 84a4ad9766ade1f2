//! [`SqliteStore`]: one shared [`Database`] handle and the repositories
//! built on it.

use std::path::Path;

use crate::{
  database::{Database, DatabaseOptions},
  exercise_sets::SqliteExerciseSets,
  exercises::SqliteExercises,
  ledger::SqliteLedger,
  outbox::SqliteOutbox,
  sync_state::SqliteSyncState,
  training_plans::SqliteTrainingPlans,
  users::SqliteUsers,
  workouts::SqliteWorkouts,
  Result,
};

/// A workout store backed by a single SQLite file.
///
/// Cloning is cheap: every clone and every repository handed out shares
/// the same connection.
#[derive(Clone)]
pub struct SqliteStore {
  db: Database,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(DatabaseOptions::file(path)).await
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> { Self::open_with(DatabaseOptions::memory()).await }

  pub async fn open_with(options: DatabaseOptions) -> Result<Self> {
    Ok(Self { db: Database::open(options).await? })
  }

  /// Wrap a handle that may not be initialised yet; it opens on first use.
  pub fn from_database(db: Database) -> Self { Self { db } }

  pub fn database(&self) -> &Database { &self.db }

  pub fn users(&self) -> SqliteUsers { SqliteUsers::new(self.db.clone()) }

  pub fn training_plans(&self) -> SqliteTrainingPlans { SqliteTrainingPlans::new(self.db.clone()) }

  pub fn exercises(&self) -> SqliteExercises { SqliteExercises::new(self.db.clone()) }

  pub fn workouts(&self) -> SqliteWorkouts { SqliteWorkouts::new(self.db.clone()) }

  pub fn exercise_sets(&self) -> SqliteExerciseSets { SqliteExerciseSets::new(self.db.clone()) }

  pub fn outbox(&self) -> SqliteOutbox { SqliteOutbox::new(self.db.clone()) }

  pub fn sync_state(&self) -> SqliteSyncState { SqliteSyncState::new(self.db.clone()) }

  pub fn ledger(&self) -> SqliteLedger { SqliteLedger::new(self.db.clone()) }
}
