//! [`SqliteWorkouts`]: workout sessions and the per-plan history view.

use liftlog_core::{
  history::{group_by_exercise, LoggedSet, WorkoutHistory, WorkoutSetRow},
  remote::RemoteWorkout,
  repository::WorkoutRepository,
  sync::{EntityType, Envelope, OutboxOperation, Reconciled},
  time,
  training_plan::PlanScope,
  workout::{NewWorkout, Workout},
};
use rusqlite::{Connection, OptionalExtension as _, Row};
use uuid::Uuid;

use crate::{
  cascade,
  database::Database,
  encode::{decode_uuid, encode_dt, encode_uuid, RawWorkout, WORKOUT_COLUMNS},
  rows::{self, EnvelopeColumns},
  Error, Result,
};

#[derive(Clone)]
pub struct SqliteWorkouts {
  db: Database,
}

impl SqliteWorkouts {
  pub fn new(db: Database) -> Self { Self { db } }
}

fn get_workout(conn: &Connection, id: Uuid) -> Result<Option<Workout>> {
  conn
    .query_row(
      &format!("SELECT {WORKOUT_COLUMNS} FROM workouts w WHERE w.id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawWorkout::from_row,
    )
    .optional()?
    .map(RawWorkout::into_workout)
    .transpose()
}

fn insert_workout(conn: &Connection, workout: &Workout) -> Result<()> {
  let e = EnvelopeColumns::from(&workout.envelope);
  conn.execute(
    "INSERT INTO workouts
       (id, trainingPlanId, userId, startedAt, completedAt, remoteId, createdAt, updatedAt,
        deletedAt, lastSyncedAt, syncStatus)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      encode_uuid(workout.id),
      encode_uuid(workout.training_plan_id),
      encode_uuid(workout.user_id),
      encode_dt(workout.started_at),
      workout.completed_at.map(encode_dt),
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

struct RawHistoryRow {
  workout:            RawWorkout,
  training_plan_name: Option<String>,
}

impl RawHistoryRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      workout:            RawWorkout::from_row(row)?,
      training_plan_name: row.get("trainingPlanName")?,
    })
  }
}

struct RawSetRow {
  id:            String,
  exercise_id:   String,
  exercise_name: Option<String>,
  set_number:    u32,
  reps:          Option<u32>,
  weight:        Option<f64>,
}

impl RawSetRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get("id")?,
      exercise_id:   row.get("exerciseId")?,
      exercise_name: row.get("exerciseName")?,
      set_number:    row.get("setNumber")?,
      reps:          row.get("reps")?,
      weight:        row.get("weight")?,
    })
  }

  fn into_row(self) -> Result<WorkoutSetRow> {
    Ok(WorkoutSetRow {
      exercise_id:   decode_uuid(&self.exercise_id)?,
      exercise_name: self.exercise_name,
      set:           LoggedSet {
        id:         decode_uuid(&self.id)?,
        set_number: self.set_number,
        reps:       self.reps.unwrap_or(0),
        weight:     self.weight.unwrap_or(0.0),
      },
    })
  }
}

fn sets_of(conn: &Connection, workout_id: Uuid) -> Result<Vec<WorkoutSetRow>> {
  let mut stmt = conn.prepare(
    "SELECT es.id, es.exerciseId, es.setNumber, es.reps, es.weight, ex.name AS exerciseName
     FROM exercise_sets es
     LEFT JOIN exercises ex ON ex.id = es.exerciseId
     WHERE es.workoutId = ?1 AND es.deletedAt IS NULL
     ORDER BY es.exerciseId, es.setNumber ASC",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(workout_id)], RawSetRow::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSetRow::into_row).collect()
}

impl WorkoutRepository for SqliteWorkouts {
  type Error = Error;

  async fn start(&self, input: NewWorkout) -> Result<Workout> {
    self
      .db
      .run_in_transaction(move |tx| {
        let now = time::now();
        let workout = Workout {
          id:               Uuid::new_v4(),
          training_plan_id: input.training_plan_id,
          user_id:          input.user_id,
          started_at:       now,
          completed_at:     None,
          envelope:         Envelope::pending_create(now),
        };
        insert_workout(tx, &workout)?;
        rows::stage(tx, EntityType::Workout, workout.id, OutboxOperation::Create, &workout)?;
        Ok(workout)
      })
      .await
  }

  async fn complete(&self, id: Uuid) -> Result<Workout> {
    self
      .db
      .run_in_transaction(move |tx| {
        let state = rows::require_live(tx, EntityType::Workout, id)?;
        let (updated_at, sync_status) = rows::touch(&state);
        let updated_at = encode_dt(updated_at);
        tx.execute(
          "UPDATE workouts SET completedAt = ?1, updatedAt = ?1, syncStatus = ?2 WHERE id = ?3",
          rusqlite::params![updated_at, sync_status.as_str(), encode_uuid(id)],
        )?;
        let workout = get_workout(tx, id)?.ok_or_else(|| Error::not_found(EntityType::Workout, id))?;
        rows::stage(tx, EntityType::Workout, workout.id, OutboxOperation::Update, &workout)?;
        Ok(workout)
      })
      .await
  }

  async fn get(&self, id: Uuid) -> Result<Option<Workout>> {
    self.db.read(move |conn| get_workout(conn, id)).await
  }

  async fn list_history(&self, scope: PlanScope) -> Result<Vec<WorkoutHistory>> {
    self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {WORKOUT_COLUMNS}, tp.name AS trainingPlanName
           FROM workouts w
           LEFT JOIN training_plans tp ON tp.id = w.trainingPlanId
           WHERE w.userId = ?1 AND w.trainingPlanId = ?2 AND w.deletedAt IS NULL
           ORDER BY w.startedAt DESC, w.rowid DESC"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![encode_uuid(scope.user_id), encode_uuid(scope.training_plan_id)],
            RawHistoryRow::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        raws
          .into_iter()
          .map(|raw| {
            let workout = raw.workout.into_workout()?;
            let exercises = group_by_exercise(sets_of(conn, workout.id)?);
            Ok(WorkoutHistory { workout, training_plan_name: raw.training_plan_name, exercises })
          })
          .collect()
      })
      .await
  }

  async fn soft_delete(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| cascade::workout(tx, id).map(drop))
      .await
  }

  async fn upsert_from_remote(&self, remote: RemoteWorkout) -> Result<Reconciled> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::reconcile(
          tx,
          EntityType::Workout,
          &remote.remote_id,
          &remote.stamps,
          |id, envelope| {
            insert_workout(tx, &Workout {
              id,
              training_plan_id: remote.training_plan_id,
              user_id: remote.user_id,
              started_at: remote.started_at.unwrap_or(envelope.created_at),
              completed_at: remote.completed_at,
              envelope: envelope.clone(),
            })
          },
          |id, envelope| {
            let e = EnvelopeColumns::from(envelope);
            tx.execute(
              "UPDATE workouts
               SET trainingPlanId = ?1, userId = ?2, startedAt = COALESCE(?3, startedAt),
                   completedAt = ?4, updatedAt = ?5, deletedAt = ?6, lastSyncedAt = ?7,
                   syncStatus = ?8
               WHERE id = ?9",
              rusqlite::params![
                encode_uuid(remote.training_plan_id),
                encode_uuid(remote.user_id),
                remote.started_at.map(encode_dt),
                remote.completed_at.map(encode_dt),
                e.updated_at,
                e.deleted_at,
                e.last_synced_at,
                e.sync_status,
                encode_uuid(id)
              ],
            )?;
            Ok(())
          },
        )
      })
      .await
  }
}
