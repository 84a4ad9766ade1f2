//! [`SqliteLedger`]: remote acknowledgements and retention.
//!
//! Compaction is the only place rows are ever hard-deleted. It purges
//! delivered outbox entries and tombstones the remote has acknowledged,
//! children before parents, and only once they are older than the cutoff.

use chrono::{DateTime, Utc};
use liftlog_core::{
  repository::SyncLedger,
  sync::{CompactionReport, EntityType, OutboxStatus, SyncStatus},
  time,
};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  database::Database,
  encode::{encode_dt, encode_uuid},
  rows, Error, Result,
};

#[derive(Clone)]
pub struct SqliteLedger {
  db: Database,
}

impl SqliteLedger {
  pub fn new(db: Database) -> Self { Self { db } }
}

/// `deletedAt` and `syncStatus` condition selecting purgeable tombstones of
/// `table` (or its alias), with the cutoff bound as `?1`.
fn tombstone(table: &str) -> String {
  format!(
    "{table}.deletedAt IS NOT NULL AND {table}.deletedAt < ?1 AND {table}.syncStatus = '{}'",
    SyncStatus::Synced.as_str()
  )
}

fn purge(conn: &Connection, sql: &str, cutoff: &str) -> Result<usize> {
  Ok(conn.execute(sql, rusqlite::params![cutoff])?)
}

fn compact_all(conn: &Connection, cutoff: &str) -> Result<CompactionReport> {
  let outbox = purge(
    conn,
    &format!(
      "DELETE FROM outbox WHERE status = '{}' AND updatedAt < ?1",
      OutboxStatus::Sent.as_str()
    ),
    cutoff,
  )?;

  let exercise_sets = purge(
    conn,
    &format!("DELETE FROM exercise_sets WHERE {}", tombstone("exercise_sets")),
    cutoff,
  )?;

  let training_plan_exercises = purge(
    conn,
    &format!(
      "DELETE FROM training_plan_exercises WHERE
         trainingPlanId IN (SELECT tp.id FROM training_plans tp WHERE {})
         OR exerciseId IN (SELECT ex.id FROM exercises ex WHERE {})",
      tombstone("tp"),
      tombstone("ex")
    ),
    cutoff,
  )?;

  let workouts = purge(
    conn,
    &format!(
      "DELETE FROM workouts WHERE {}
         AND NOT EXISTS (SELECT 1 FROM exercise_sets es WHERE es.workoutId = workouts.id)",
      tombstone("workouts")
    ),
    cutoff,
  )?;

  let exercises = purge(
    conn,
    &format!(
      "DELETE FROM exercises WHERE {}
         AND NOT EXISTS (SELECT 1 FROM exercise_sets es WHERE es.exerciseId = exercises.id)
         AND NOT EXISTS (SELECT 1 FROM training_plan_exercises tpe WHERE tpe.exerciseId = exercises.id)",
      tombstone("exercises")
    ),
    cutoff,
  )?;

  let training_plans = purge(
    conn,
    &format!(
      "DELETE FROM training_plans WHERE {}
         AND NOT EXISTS (SELECT 1 FROM workouts w WHERE w.trainingPlanId = training_plans.id)
         AND NOT EXISTS (SELECT 1 FROM exercises ex WHERE ex.trainingPlanId = training_plans.id)
         AND NOT EXISTS (
           SELECT 1 FROM training_plan_exercises tpe WHERE tpe.trainingPlanId = training_plans.id
         )",
      tombstone("training_plans")
    ),
    cutoff,
  )?;

  let users = purge(
    conn,
    &format!(
      "DELETE FROM users WHERE {}
         AND NOT EXISTS (SELECT 1 FROM training_plans tp WHERE tp.userId = users.id)
         AND NOT EXISTS (SELECT 1 FROM exercises ex WHERE ex.userId = users.id)
         AND NOT EXISTS (SELECT 1 FROM workouts w WHERE w.userId = users.id)",
      tombstone("users")
    ),
    cutoff,
  )?;

  Ok(CompactionReport {
    outbox,
    exercise_sets,
    training_plan_exercises,
    workouts,
    exercises,
    training_plans,
    users,
  })
}

impl SyncLedger for SqliteLedger {
  type Error = Error;

  async fn acknowledge(&self, entity_type: EntityType, local_id: Uuid, remote_id: Option<String>) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| {
        // Mappings carry no envelope to stamp; the ack only has to name one.
        if entity_type == EntityType::TrainingPlanExercise {
          let exists = tx
            .query_row(
              "SELECT 1 FROM training_plan_exercises WHERE id = ?1",
              rusqlite::params![encode_uuid(local_id)],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          return if exists { Ok(()) } else { Err(Error::not_found(entity_type, local_id)) };
        }

        if rows::row_state(tx, entity_type, local_id)?.is_none() {
          return Err(Error::not_found(entity_type, local_id));
        }
        // A row edited again after the acknowledged write stays pending.
        tx.execute(
          &format!(
            "UPDATE {} SET
               remoteId = COALESCE(?1, remoteId),
               lastSyncedAt = ?2,
               syncStatus = CASE
                 WHEN EXISTS (
                   SELECT 1 FROM outbox WHERE entityId = ?3 AND entityType = ?4 AND status = ?5
                 ) THEN syncStatus
                 ELSE ?6
               END
             WHERE id = ?3",
            rows::table(entity_type)
          ),
          rusqlite::params![
            remote_id,
            encode_dt(time::now()),
            encode_uuid(local_id),
            entity_type.as_str(),
            OutboxStatus::Pending.as_str(),
            SyncStatus::Synced.as_str(),
          ],
        )?;
        debug!(%entity_type, %local_id, "Remote acknowledgement recorded");
        Ok(())
      })
      .await
  }

  async fn compact(&self, older_than: DateTime<Utc>) -> Result<CompactionReport> {
    let cutoff = encode_dt(older_than);
    self
      .db
      .run_in_transaction(move |tx| {
        let report = compact_all(tx, &cutoff)?;
        info!(?report, %cutoff, "Store compacted");
        Ok(report)
      })
      .await
  }
}
