//! [`SqliteExerciseSets`]: sets logged within a workout, and the
//! per-exercise history aggregation.

use liftlog_core::{
  history::{group_by_date, ExerciseHistoryDay, ExerciseSetRow},
  remote::RemoteExerciseSet,
  repository::ExerciseSetRepository,
  sync::{EntityType, Envelope, OutboxOperation, Reconciled},
  time,
  workout::{ExerciseSet, ExerciseSetPatch, NewExerciseSet},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  database::Database,
  encode::{decode_dt, encode_dt, encode_uuid, RawExerciseSet, EXERCISE_SET_COLUMNS},
  rows::{self, EnvelopeColumns},
  Error, Result,
};

#[derive(Clone)]
pub struct SqliteExerciseSets {
  db: Database,
}

impl SqliteExerciseSets {
  pub fn new(db: Database) -> Self { Self { db } }
}

fn get_set(conn: &Connection, id: Uuid) -> Result<Option<ExerciseSet>> {
  conn
    .query_row(
      &format!("SELECT {EXERCISE_SET_COLUMNS} FROM exercise_sets es WHERE es.id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawExerciseSet::from_row,
    )
    .optional()?
    .map(RawExerciseSet::into_exercise_set)
    .transpose()
}

fn insert_set(conn: &Connection, set: &ExerciseSet) -> Result<()> {
  let e = EnvelopeColumns::from(&set.envelope);
  conn.execute(
    "INSERT INTO exercise_sets
       (id, workoutId, exerciseId, setNumber, reps, weight, remoteId, createdAt, updatedAt,
        deletedAt, lastSyncedAt, syncStatus)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    rusqlite::params![
      encode_uuid(set.id),
      encode_uuid(set.workout_id),
      encode_uuid(set.exercise_id),
      set.set_number,
      set.reps,
      set.weight,
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

impl ExerciseSetRepository for SqliteExerciseSets {
  type Error = Error;

  async fn log(&self, input: NewExerciseSet) -> Result<ExerciseSet> {
    self
      .db
      .run_in_transaction(move |tx| {
        let workout_state = rows::require_live(tx, EntityType::Workout, input.workout_id)?;
        let set = ExerciseSet {
          id:          Uuid::new_v4(),
          workout_id:  input.workout_id,
          exercise_id: input.exercise_id,
          set_number:  input.set_number,
          reps:        input.reps,
          weight:      input.weight,
          envelope:    Envelope::pending_create(time::now()),
        };
        insert_set(tx, &set)?;
        rows::stage(tx, EntityType::ExerciseSet, set.id, OutboxOperation::Create, &set)?;

        // Recency only; the workout's own sync status is untouched.
        tx.execute(
          "UPDATE workouts SET updatedAt = ?1 WHERE id = ?2",
          rusqlite::params![
            encode_dt(time::next_after(workout_state.updated_at)),
            encode_uuid(input.workout_id)
          ],
        )?;
        Ok(set)
      })
      .await
  }

  async fn update(&self, input: ExerciseSetPatch) -> Result<ExerciseSet> {
    self
      .db
      .run_in_transaction(move |tx| {
        let state = rows::require_live(tx, EntityType::ExerciseSet, input.id)?;
        let (updated_at, sync_status) = rows::touch(&state);
        tx.execute(
          "UPDATE exercise_sets
           SET reps = COALESCE(?1, reps), weight = COALESCE(?2, weight), updatedAt = ?3, syncStatus = ?4
           WHERE id = ?5",
          rusqlite::params![
            input.reps,
            input.weight,
            encode_dt(updated_at),
            sync_status.as_str(),
            encode_uuid(input.id)
          ],
        )?;
        let set = get_set(tx, input.id)?.ok_or_else(|| Error::not_found(EntityType::ExerciseSet, input.id))?;
        rows::stage(tx, EntityType::ExerciseSet, set.id, OutboxOperation::Update, &set)?;
        Ok(set)
      })
      .await
  }

  async fn list_for_workout(&self, workout_id: Uuid) -> Result<Vec<ExerciseSet>> {
    self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EXERCISE_SET_COLUMNS} FROM exercise_sets es
           WHERE es.workoutId = ?1 AND es.deletedAt IS NULL
           ORDER BY es.exerciseId, es.setNumber ASC"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(workout_id)], RawExerciseSet::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawExerciseSet::into_exercise_set).collect()
      })
      .await
  }

  async fn history_by_exercise(&self, exercise_id: Uuid) -> Result<Vec<ExerciseHistoryDay>> {
    let set_rows = self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT es.setNumber, es.reps, es.weight, w.startedAt
           FROM exercise_sets es
           JOIN workouts w ON w.id = es.workoutId
           WHERE es.exerciseId = ?1 AND es.deletedAt IS NULL AND w.deletedAt IS NULL
           ORDER BY w.startedAt DESC, es.setNumber ASC",
        )?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(exercise_id)], |row| {
            Ok((
              row.get::<_, u32>(0)?,
              row.get::<_, Option<u32>>(1)?,
              row.get::<_, Option<f64>>(2)?,
              row.get::<_, String>(3)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        raws
          .into_iter()
          .map(|(set_number, reps, weight, started_at)| {
            Ok(ExerciseSetRow {
              date: decode_dt(&started_at)?,
              set_number,
              reps: reps.unwrap_or(0),
              weight: weight.unwrap_or(0.0),
            })
          })
          .collect::<Result<Vec<_>>>()
      })
      .await?;

    Ok(group_by_date(set_rows))
  }

  async fn soft_delete(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| rows::soft_delete(tx, EntityType::ExerciseSet, id).map(drop))
      .await
  }

  async fn upsert_from_remote(&self, remote: RemoteExerciseSet) -> Result<Reconciled> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::reconcile(
          tx,
          EntityType::ExerciseSet,
          &remote.remote_id,
          &remote.stamps,
          |id, envelope| {
            insert_set(tx, &ExerciseSet {
              id,
              workout_id: remote.workout_id,
              exercise_id: remote.exercise_id,
              set_number: remote.set_number,
              reps: remote.reps,
              weight: remote.weight,
              envelope: envelope.clone(),
            })
          },
          |id, envelope| {
            let e = EnvelopeColumns::from(envelope);
            tx.execute(
              "UPDATE exercise_sets
               SET setNumber = ?1, reps = ?2, weight = ?3, updatedAt = ?4, deletedAt = ?5,
                   lastSyncedAt = ?6, syncStatus = ?7
               WHERE id = ?8",
              rusqlite::params![
                remote.set_number,
                remote.reps,
                remote.weight,
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
