//! [`SqliteExercises`]: exercises and their plan attachments.
//!
//! An exercise keeps the plan it was created in as its home plan
//! (`trainingPlanId`), but plan membership is read exclusively through
//! `training_plan_exercises`, so one exercise can appear in many plans.

use liftlog_core::{
  exercise::{Exercise, ExercisePatch, NewExercise, PlanAttachment},
  remote::RemoteExercise,
  repository::ExerciseRepository,
  sync::{EntityType, Envelope, NewOutboxEntry, OutboxOperation, Reconciled, UpsertOutcome},
  time,
  training_plan::PlanScope,
};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{
  database::Database,
  encode::{encode_dt, encode_uuid, RawExercise, EXERCISE_COLUMNS},
  outbox,
  rows::{self, EnvelopeColumns},
  Error, Result,
};

#[derive(Clone)]
pub struct SqliteExercises {
  db: Database,
}

impl SqliteExercises {
  pub fn new(db: Database) -> Self { Self { db } }

  /// Number of mapping rows for a plan/exercise pair; at most one.
  pub async fn attachment_count(&self, attachment: PlanAttachment) -> Result<u32> {
    self
      .db
      .read(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM training_plan_exercises WHERE trainingPlanId = ?1 AND exerciseId = ?2",
          rusqlite::params![
            encode_uuid(attachment.training_plan_id),
            encode_uuid(attachment.exercise_id)
          ],
          |row| row.get(0),
        )?)
      })
      .await
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

fn get_exercise(conn: &Connection, id: Uuid) -> Result<Option<Exercise>> {
  conn
    .query_row(
      &format!("SELECT {EXERCISE_COLUMNS} FROM exercises ex WHERE ex.id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawExercise::from_row,
    )
    .optional()?
    .map(RawExercise::into_exercise)
    .transpose()
}

fn query_exercises(conn: &Connection, sql: &str, scope: PlanScope) -> Result<Vec<Exercise>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(
      rusqlite::params![encode_uuid(scope.user_id), encode_uuid(scope.training_plan_id)],
      RawExercise::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawExercise::into_exercise).collect()
}

fn insert_exercise(conn: &Connection, exercise: &Exercise) -> Result<()> {
  let e = EnvelopeColumns::from(&exercise.envelope);
  conn.execute(
    "INSERT INTO exercises
       (id, trainingPlanId, userId, name, sets, remoteId, createdAt, updatedAt, deletedAt,
        lastSyncedAt, syncStatus)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      encode_uuid(exercise.id),
      encode_uuid(exercise.training_plan_id),
      encode_uuid(exercise.user_id),
      exercise.name,
      exercise.sets,
      e.remote_id,
      e.created_at,
      e.updated_at,
      e.deleted_at,
      e.last_synced_at,
      e.sync_status,
    ],
  )?;
  Ok(())
}

/// Insert the mapping row unless the pair is already attached. Returns the
/// new mapping's id and creation time when a row was written.
fn attach(conn: &Connection, training_plan_id: Uuid, exercise_id: Uuid) -> Result<Option<(Uuid, String)>> {
  let id = Uuid::new_v4();
  let created_at = encode_dt(time::now());
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO training_plan_exercises (id, trainingPlanId, exerciseId, createdAt)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(id),
      encode_uuid(training_plan_id),
      encode_uuid(exercise_id),
      created_at
    ],
  )?;
  Ok((inserted > 0).then_some((id, created_at)))
}

/// Attach and, when a row was written, stage the mapping's outbox `create`.
fn attach_and_stage(conn: &Connection, training_plan_id: Uuid, exercise_id: Uuid) -> Result<bool> {
  let Some((mapping_id, created_at)) = attach(conn, training_plan_id, exercise_id)? else {
    return Ok(false);
  };
  outbox::enqueue(
    conn,
    &NewOutboxEntry::new(
      EntityType::TrainingPlanExercise,
      mapping_id,
      OutboxOperation::Create,
      json!({
        "id": mapping_id,
        "trainingPlanId": training_plan_id,
        "exerciseId": exercise_id,
        "createdAt": created_at,
      }),
    ),
  )?;
  Ok(true)
}

fn require_exercise(conn: &Connection, id: Uuid) -> Result<Exercise> {
  get_exercise(conn, id)?.ok_or_else(|| Error::not_found(EntityType::Exercise, id))
}

// ─── Repository ──────────────────────────────────────────────────────────────

impl ExerciseRepository for SqliteExercises {
  type Error = Error;

  async fn list_for_plan(&self, scope: PlanScope) -> Result<Vec<Exercise>> {
    self
      .db
      .read(move |conn| {
        query_exercises(
          conn,
          &format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises ex
             JOIN training_plan_exercises tpe ON tpe.exerciseId = ex.id
             JOIN training_plans tp ON tp.id = tpe.trainingPlanId
             WHERE ex.userId = ?1 AND tpe.trainingPlanId = ?2
               AND ex.deletedAt IS NULL AND tp.deletedAt IS NULL
             ORDER BY ex.updatedAt DESC, ex.rowid DESC"
          ),
          scope,
        )
      })
      .await
  }

  async fn list_available_for_plan(&self, scope: PlanScope) -> Result<Vec<Exercise>> {
    self
      .db
      .read(move |conn| {
        query_exercises(
          conn,
          &format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises ex
             WHERE ex.userId = ?1 AND ex.deletedAt IS NULL
               AND ex.id NOT IN (
                 SELECT exerciseId FROM training_plan_exercises WHERE trainingPlanId = ?2
               )
             ORDER BY ex.name ASC"
          ),
          scope,
        )
      })
      .await
  }

  async fn get(&self, id: Uuid) -> Result<Option<Exercise>> {
    self.db.read(move |conn| get_exercise(conn, id)).await
  }

  async fn create(&self, input: NewExercise) -> Result<Exercise> {
    self
      .db
      .run_in_transaction(move |tx| {
        let exercise = Exercise {
          id:               Uuid::new_v4(),
          training_plan_id: input.training_plan_id,
          user_id:          input.user_id,
          name:             input.name,
          sets:             input.sets,
          envelope:         Envelope::pending_create(time::now()),
        };
        insert_exercise(tx, &exercise)?;
        rows::stage(tx, EntityType::Exercise, exercise.id, OutboxOperation::Create, &exercise)?;
        attach(tx, exercise.training_plan_id, exercise.id)?;
        Ok(exercise)
      })
      .await
  }

  async fn add_existing_to_plan(&self, input: PlanAttachment) -> Result<bool> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::require_live(tx, EntityType::Exercise, input.exercise_id)?;
        rows::require_live(tx, EntityType::TrainingPlan, input.training_plan_id)?;
        let attached = attach_and_stage(tx, input.training_plan_id, input.exercise_id)?;
        debug!(
          exercise_id = %input.exercise_id,
          training_plan_id = %input.training_plan_id,
          attached,
          "Exercise attached to plan"
        );
        Ok(attached)
      })
      .await
  }

  async fn update(&self, input: ExercisePatch) -> Result<Exercise> {
    self
      .db
      .run_in_transaction(move |tx| {
        let state = rows::require_live(tx, EntityType::Exercise, input.id)?;
        let (updated_at, sync_status) = rows::touch(&state);
        tx.execute(
          "UPDATE exercises
           SET name = COALESCE(?1, name), sets = COALESCE(?2, sets), updatedAt = ?3, syncStatus = ?4
           WHERE id = ?5",
          rusqlite::params![
            input.name,
            input.sets,
            encode_dt(updated_at),
            sync_status.as_str(),
            encode_uuid(input.id)
          ],
        )?;
        let exercise = require_exercise(tx, input.id)?;
        rows::stage(tx, EntityType::Exercise, exercise.id, OutboxOperation::Update, &exercise)?;
        Ok(exercise)
      })
      .await
  }

  async fn soft_delete(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| rows::soft_delete(tx, EntityType::Exercise, id).map(drop))
      .await
  }

  async fn upsert_from_remote(&self, remote: RemoteExercise) -> Result<Reconciled> {
    self
      .db
      .run_in_transaction(move |tx| {
        let reconciled = rows::reconcile(
          tx,
          EntityType::Exercise,
          &remote.remote_id,
          &remote.stamps,
          |id, envelope| {
            insert_exercise(tx, &Exercise {
              id,
              training_plan_id: remote.training_plan_id,
              user_id: remote.user_id,
              name: remote.name.clone(),
              sets: remote.sets,
              envelope: envelope.clone(),
            })
          },
          |id, envelope| {
            let e = EnvelopeColumns::from(envelope);
            tx.execute(
              "UPDATE exercises
               SET trainingPlanId = ?1, userId = ?2, name = ?3, sets = ?4, updatedAt = ?5,
                   deletedAt = ?6, lastSyncedAt = ?7, syncStatus = ?8
               WHERE id = ?9",
              rusqlite::params![
                encode_uuid(remote.training_plan_id),
                encode_uuid(remote.user_id),
                remote.name,
                remote.sets,
                e.updated_at,
                e.deleted_at,
                e.last_synced_at,
                e.sync_status,
                encode_uuid(id)
              ],
            )?;
            Ok(())
          },
        )?;
        if reconciled.outcome != UpsertOutcome::Stale {
          attach(tx, remote.training_plan_id, reconciled.local_id)?;
        }
        Ok(reconciled)
      })
      .await
  }
}
