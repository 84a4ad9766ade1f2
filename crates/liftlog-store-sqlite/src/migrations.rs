//! Ordered, versioned schema upgrades.
//!
//! The applied version lives in `metadata` under `db_version` (absent means
//! 0). Each pending migration runs in its own immediate transaction together
//! with the version bump, so a crash resumes from the last fully applied
//! version and never records a partial one. Bodies are still written as
//! idempotent DDL and insert-or-ignore backfills.

use liftlog_core::time;
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use crate::{
  encode::{encode_dt, encode_uuid},
  Error, Result,
};

pub const VERSION_KEY: &str = "db_version";

/// A single schema upgrade.
pub struct Migration {
  pub version: u32,
  pub name:    &'static str,
  pub up:      fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

/// Every migration, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
  Migration { version: 1, name: "create-core-tables", up: create_core_tables },
  Migration {
    version: 2,
    name:    "add-training-plan-exercise-mapping",
    up:      add_training_plan_exercise_mapping,
  },
];

/// The newest schema version this build knows about.
pub fn latest_version() -> u32 { MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0) }

/// Bring the schema up to date. Returns the version now recorded.
pub fn run(conn: &mut Connection) -> Result<u32> { run_with(conn, MIGRATIONS) }

pub(crate) fn run_with(conn: &mut Connection, migrations: &[Migration]) -> Result<u32> {
  conn.execute_batch(METADATA)?;
  let mut current = current_version(conn)?;

  let mut pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > current).collect();
  pending.sort_by_key(|m| m.version);

  for migration in pending {
    info!(version = migration.version, name = migration.name, "Applying migration");

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    (migration.up)(&tx).map_err(|source| Error::Migration {
      version: migration.version,
      name: migration.name,
      source,
    })?;
    record_version(&tx, migration.version)?;
    tx.commit()?;

    current = migration.version;
    info!(version = current, "Migration complete");
  }

  Ok(current)
}

/// The recorded schema version; 0 for a fresh store.
pub fn current_version(conn: &Connection) -> Result<u32> {
  let raw: Option<Option<String>> = conn
    .query_row(
      "SELECT value FROM metadata WHERE key = ?1",
      rusqlite::params![VERSION_KEY],
      |row| row.get(0),
    )
    .optional()?;

  match raw.flatten() {
    None => Ok(0),
    Some(value) => value
      .parse()
      .map_err(|_| Error::Metadata(format!("{VERSION_KEY} is not a version number: {value:?}"))),
  }
}

fn record_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
    rusqlite::params![VERSION_KEY, version.to_string()],
  )?;
  Ok(())
}

// ─── Version 1 ───────────────────────────────────────────────────────────────

const METADATA: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT
);
";

const CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,
    remoteId     TEXT,
    name         TEXT,
    mail         TEXT,
    password     TEXT,              -- argon2 PHC string, never plaintext
    createdAt    TEXT NOT NULL,
    updatedAt    TEXT NOT NULL,
    deletedAt    TEXT,
    lastSyncedAt TEXT,
    syncStatus   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_mail ON users(mail);

CREATE TABLE IF NOT EXISTS training_plans (
    id           TEXT PRIMARY KEY NOT NULL,
    remoteId     TEXT,
    userId       TEXT NOT NULL,
    name         TEXT NOT NULL,
    createdAt    TEXT NOT NULL,
    updatedAt    TEXT NOT NULL,
    deletedAt    TEXT,
    lastSyncedAt TEXT,
    syncStatus   TEXT NOT NULL,
    FOREIGN KEY (userId) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_training_plans_user ON training_plans(userId);
CREATE INDEX IF NOT EXISTS idx_training_plans_sync ON training_plans(syncStatus);

-- trainingPlanId is the home plan; membership lives in training_plan_exercises.
CREATE TABLE IF NOT EXISTS exercises (
    id             TEXT PRIMARY KEY NOT NULL,
    remoteId       TEXT,
    trainingPlanId TEXT NOT NULL,
    userId         TEXT NOT NULL,
    name           TEXT NOT NULL,
    sets           INTEGER DEFAULT 0,
    createdAt      TEXT NOT NULL,
    updatedAt      TEXT NOT NULL,
    deletedAt      TEXT,
    lastSyncedAt   TEXT,
    syncStatus     TEXT NOT NULL,
    FOREIGN KEY (trainingPlanId) REFERENCES training_plans(id) ON DELETE CASCADE,
    FOREIGN KEY (userId) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_exercises_training_plan ON exercises(trainingPlanId);
CREATE INDEX IF NOT EXISTS idx_exercises_sync ON exercises(syncStatus);

CREATE TABLE IF NOT EXISTS workouts (
    id             TEXT PRIMARY KEY NOT NULL,
    remoteId       TEXT,
    trainingPlanId TEXT NOT NULL,
    userId         TEXT NOT NULL,
    startedAt      TEXT NOT NULL,
    completedAt    TEXT,
    createdAt      TEXT NOT NULL,
    updatedAt      TEXT NOT NULL,
    deletedAt      TEXT,
    lastSyncedAt   TEXT,
    syncStatus     TEXT NOT NULL,
    FOREIGN KEY (trainingPlanId) REFERENCES training_plans(id) ON DELETE CASCADE,
    FOREIGN KEY (userId) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_workouts_user_plan ON workouts(userId, trainingPlanId);
CREATE INDEX IF NOT EXISTS idx_workouts_sync ON workouts(syncStatus);

CREATE TABLE IF NOT EXISTS exercise_sets (
    id           TEXT PRIMARY KEY NOT NULL,
    remoteId     TEXT,
    workoutId    TEXT NOT NULL,
    exerciseId   TEXT NOT NULL,
    setNumber    INTEGER NOT NULL,
    reps         INTEGER DEFAULT 0,
    weight       REAL DEFAULT 0,
    createdAt    TEXT NOT NULL,
    updatedAt    TEXT NOT NULL,
    deletedAt    TEXT,
    lastSyncedAt TEXT,
    syncStatus   TEXT NOT NULL,
    FOREIGN KEY (workoutId) REFERENCES workouts(id) ON DELETE CASCADE,
    FOREIGN KEY (exerciseId) REFERENCES exercises(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_sets_workout ON exercise_sets(workoutId);
CREATE INDEX IF NOT EXISTS idx_sets_exercise ON exercise_sets(exerciseId);
CREATE INDEX IF NOT EXISTS idx_sets_sync ON exercise_sets(syncStatus);

CREATE TABLE IF NOT EXISTS outbox (
    id         TEXT PRIMARY KEY NOT NULL,
    entityType TEXT NOT NULL,
    entityId   TEXT NOT NULL,
    operation  TEXT NOT NULL,   -- 'create' | 'update' | 'delete'
    payload    TEXT,            -- JSON
    createdAt  TEXT NOT NULL,
    updatedAt  TEXT NOT NULL,
    status     TEXT NOT NULL,   -- 'pending' | 'sent' | 'failed'
    error      TEXT
);
CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox(status);

CREATE TABLE IF NOT EXISTS sync_state (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT
);
";

fn create_core_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(METADATA)?;
  tx.execute_batch(CORE_TABLES)?;
  tx.execute(
    "INSERT OR IGNORE INTO sync_state (key, value) VALUES ('lastSyncedAt', NULL)",
    [],
  )?;
  tx.execute(
    "INSERT OR REPLACE INTO sync_state (key, value) VALUES ('migratedAt', ?1)",
    rusqlite::params![encode_dt(time::now())],
  )?;
  Ok(())
}

// ─── Version 2 ───────────────────────────────────────────────────────────────

const TRAINING_PLAN_EXERCISES: &str = "
CREATE TABLE IF NOT EXISTS training_plan_exercises (
    id             TEXT PRIMARY KEY NOT NULL,
    trainingPlanId TEXT NOT NULL,
    exerciseId     TEXT NOT NULL,
    createdAt      TEXT NOT NULL,
    UNIQUE (trainingPlanId, exerciseId),
    FOREIGN KEY (trainingPlanId) REFERENCES training_plans(id) ON DELETE CASCADE,
    FOREIGN KEY (exerciseId) REFERENCES exercises(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_tpe_training_plan ON training_plan_exercises(trainingPlanId);
CREATE INDEX IF NOT EXISTS idx_tpe_exercise ON training_plan_exercises(exerciseId);
";

/// Adds the plan/exercise mapping and attaches every existing exercise to
/// its home plan.
fn add_training_plan_exercise_mapping(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(TRAINING_PLAN_EXERCISES)?;

  let existing: Vec<(String, String, Option<String>)> = {
    let mut stmt = tx.prepare("SELECT id, trainingPlanId, createdAt FROM exercises")?;
    stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
      .collect::<rusqlite::Result<_>>()?
  };

  let mut insert = tx.prepare(
    "INSERT OR IGNORE INTO training_plan_exercises (id, trainingPlanId, exerciseId, createdAt)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (exercise_id, plan_id, created_at) in existing {
    let created_at = created_at.unwrap_or_else(|| encode_dt(time::now()));
    insert.execute(rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      plan_id,
      exercise_id,
      created_at
    ])?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table_count(conn: &Connection) -> i64 {
    conn
      .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |r| r.get(0))
      .unwrap()
  }

  fn row_count(conn: &Connection, table: &str) -> i64 {
    conn
      .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
      .unwrap()
  }

  fn table_exists(conn: &Connection, table: &str) -> bool {
    conn
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |r| r.get::<_, i64>(0),
      )
      .unwrap()
      == 1
  }

  fn fail(_: &Transaction<'_>) -> rusqlite::Result<()> {
    Err(rusqlite::Error::InvalidQuery)
  }

  fn create_probe(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("CREATE TABLE IF NOT EXISTS probe (id INTEGER PRIMARY KEY);")
  }

  #[test]
  fn fresh_store_reaches_latest_version() {
    let mut conn = Connection::open_in_memory().unwrap();
    let version = run(&mut conn).unwrap();

    assert_eq!(version, latest_version());
    assert_eq!(current_version(&conn).unwrap(), 2);
    for table in [
      "metadata",
      "users",
      "training_plans",
      "exercises",
      "workouts",
      "exercise_sets",
      "training_plan_exercises",
      "outbox",
      "sync_state",
    ] {
      assert!(table_exists(&conn, table), "{table} missing");
    }
  }

  #[test]
  fn second_run_changes_nothing() {
    let mut conn = Connection::open_in_memory().unwrap();
    run(&mut conn).unwrap();
    let tables = table_count(&conn);
    let state_rows = row_count(&conn, "sync_state");
    let metadata_rows = row_count(&conn, "metadata");

    assert_eq!(run(&mut conn).unwrap(), 2);
    assert_eq!(table_count(&conn), tables);
    assert_eq!(row_count(&conn, "sync_state"), state_rows);
    assert_eq!(row_count(&conn, "metadata"), metadata_rows);
  }

  #[test]
  fn version_two_backfills_existing_exercises_once() {
    let mut conn = Connection::open_in_memory().unwrap();
    run_with(&mut conn, &MIGRATIONS[..1]).unwrap();
    conn
      .execute_batch(
        "INSERT INTO users (id, createdAt, updatedAt, syncStatus)
           VALUES ('u1', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z', 'synced');
         INSERT INTO training_plans (id, userId, name, createdAt, updatedAt, syncStatus)
           VALUES ('p1', 'u1', 'Legs', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z', 'synced');
         INSERT INTO exercises (id, trainingPlanId, userId, name, sets, createdAt, updatedAt, syncStatus)
           VALUES ('e1', 'p1', 'u1', 'Squat', 3, '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z', 'synced');",
      )
      .unwrap();

    assert_eq!(run(&mut conn).unwrap(), 2);
    assert_eq!(row_count(&conn, "training_plan_exercises"), 1);

    // Re-running the body (as after a crash mid-step) must not duplicate.
    let tx = conn.transaction().unwrap();
    add_training_plan_exercise_mapping(&tx).unwrap();
    tx.commit().unwrap();
    assert_eq!(row_count(&conn, "training_plan_exercises"), 1);
  }

  #[test]
  fn failed_step_keeps_last_recorded_version() {
    let mut conn = Connection::open_in_memory().unwrap();
    let migrations = [
      Migration { version: 1, name: "probe", up: create_probe },
      Migration { version: 2, name: "broken", up: fail },
    ];

    let err = run_with(&mut conn, &migrations).unwrap_err();
    assert!(matches!(err, Error::Migration { version: 2, name: "broken", .. }));
    assert_eq!(current_version(&conn).unwrap(), 1);
    assert_eq!(row_count(&conn, "probe"), 0);
  }

  #[test]
  fn failed_step_rolls_back_its_own_changes() {
    fn probe_then_fail(tx: &Transaction<'_>) -> rusqlite::Result<()> {
      create_probe(tx)?;
      fail(tx)
    }

    let mut conn = Connection::open_in_memory().unwrap();
    let migrations = [Migration { version: 1, name: "half", up: probe_then_fail }];

    assert!(run_with(&mut conn, &migrations).is_err());
    assert_eq!(current_version(&conn).unwrap(), 0);
    assert!(!table_exists(&conn, "probe"));
  }

  #[test]
  fn migrations_apply_in_ascending_order() {
    fn needs_probe(tx: &Transaction<'_>) -> rusqlite::Result<()> {
      tx.execute("INSERT INTO probe (id) VALUES (1)", []).map(|_| ())
    }

    let mut conn = Connection::open_in_memory().unwrap();
    let migrations = [
      Migration { version: 2, name: "fill", up: needs_probe },
      Migration { version: 1, name: "probe", up: create_probe },
    ];

    assert_eq!(run_with(&mut conn, &migrations).unwrap(), 2);
    assert_eq!(row_count(&conn, "probe"), 1);
  }
}
