//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision
//! (`2024-01-01T00:00:00.000Z`), so text order matches time order. UUIDs are
//! stored as hyphenated lowercase strings; enums by their wire names.

use chrono::{DateTime, SecondsFormat, Utc};
use liftlog_core::{
  exercise::Exercise,
  sync::{Envelope, OutboxEntry, SyncStatus},
  training_plan::TrainingPlan,
  user::User,
  workout::{ExerciseSet, Workout},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Millis, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> { s.map(decode_dt).transpose() }

/// Parse a wire-named enum column.
pub fn decode_enum<T>(s: &str) -> Result<T>
where
  T: std::str::FromStr<Err = liftlog_core::Error>,
{
  Ok(s.parse()?)
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Raw strings of the sync envelope shared by every entity table.
pub struct RawEnvelope {
  pub remote_id:      Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
  pub deleted_at:     Option<String>,
  pub last_synced_at: Option<String>,
  pub sync_status:    String,
}

impl RawEnvelope {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      remote_id:      row.get("remoteId")?,
      created_at:     row.get("createdAt")?,
      updated_at:     row.get("updatedAt")?,
      deleted_at:     row.get("deletedAt")?,
      last_synced_at: row.get("lastSyncedAt")?,
      sync_status:    row.get("syncStatus")?,
    })
  }

  pub fn into_envelope(self) -> Result<Envelope> {
    Ok(Envelope {
      remote_id:      self.remote_id,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
      deleted_at:     decode_opt_dt(self.deleted_at.as_deref())?,
      last_synced_at: decode_opt_dt(self.last_synced_at.as_deref())?,
      sync_status:    decode_enum::<SyncStatus>(&self.sync_status)?,
    })
  }
}

// ─── Entity rows ─────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "id, remoteId, name, mail, createdAt, updatedAt, deletedAt, lastSyncedAt, syncStatus";

pub struct RawUser {
  pub id:       String,
  pub name:     Option<String>,
  pub mail:     Option<String>,
  pub envelope: RawEnvelope,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get("id")?,
      name:     row.get("name")?,
      mail:     row.get("mail")?,
      envelope: RawEnvelope::from_row(row)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:       decode_uuid(&self.id)?,
      name:     self.name.unwrap_or_default(),
      mail:     self.mail.unwrap_or_default(),
      envelope: self.envelope.into_envelope()?,
    })
  }
}

pub const TRAINING_PLAN_COLUMNS: &str = "tp.id, tp.remoteId, tp.userId, tp.name, tp.createdAt, \
   tp.updatedAt, tp.deletedAt, tp.lastSyncedAt, tp.syncStatus";

pub struct RawTrainingPlan {
  pub id:       String,
  pub user_id:  String,
  pub name:     String,
  pub envelope: RawEnvelope,
}

impl RawTrainingPlan {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get("id")?,
      user_id:  row.get("userId")?,
      name:     row.get("name")?,
      envelope: RawEnvelope::from_row(row)?,
    })
  }

  pub fn into_training_plan(self) -> Result<TrainingPlan> {
    Ok(TrainingPlan {
      id:       decode_uuid(&self.id)?,
      user_id:  decode_uuid(&self.user_id)?,
      name:     self.name,
      envelope: self.envelope.into_envelope()?,
    })
  }
}

pub const EXERCISE_COLUMNS: &str = "ex.id, ex.remoteId, ex.trainingPlanId, ex.userId, ex.name, \
   ex.sets, ex.createdAt, ex.updatedAt, ex.deletedAt, ex.lastSyncedAt, ex.syncStatus";

pub struct RawExercise {
  pub id:               String,
  pub training_plan_id: String,
  pub user_id:          String,
  pub name:             String,
  pub sets:             Option<u32>,
  pub envelope:         RawEnvelope,
}

impl RawExercise {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get("id")?,
      training_plan_id: row.get("trainingPlanId")?,
      user_id:          row.get("userId")?,
      name:             row.get("name")?,
      sets:             row.get("sets")?,
      envelope:         RawEnvelope::from_row(row)?,
    })
  }

  pub fn into_exercise(self) -> Result<Exercise> {
    Ok(Exercise {
      id:               decode_uuid(&self.id)?,
      training_plan_id: decode_uuid(&self.training_plan_id)?,
      user_id:          decode_uuid(&self.user_id)?,
      name:             self.name,
      sets:             self.sets.unwrap_or(0),
      envelope:         self.envelope.into_envelope()?,
    })
  }
}

pub const WORKOUT_COLUMNS: &str = "w.id, w.remoteId, w.trainingPlanId, w.userId, w.startedAt, \
   w.completedAt, w.createdAt, w.updatedAt, w.deletedAt, w.lastSyncedAt, w.syncStatus";

pub struct RawWorkout {
  pub id:               String,
  pub training_plan_id: String,
  pub user_id:          String,
  pub started_at:       String,
  pub completed_at:     Option<String>,
  pub envelope:         RawEnvelope,
}

impl RawWorkout {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get("id")?,
      training_plan_id: row.get("trainingPlanId")?,
      user_id:          row.get("userId")?,
      started_at:       row.get("startedAt")?,
      completed_at:     row.get("completedAt")?,
      envelope:         RawEnvelope::from_row(row)?,
    })
  }

  pub fn into_workout(self) -> Result<Workout> {
    Ok(Workout {
      id:               decode_uuid(&self.id)?,
      training_plan_id: decode_uuid(&self.training_plan_id)?,
      user_id:          decode_uuid(&self.user_id)?,
      started_at:       decode_dt(&self.started_at)?,
      completed_at:     decode_opt_dt(self.completed_at.as_deref())?,
      envelope:         self.envelope.into_envelope()?,
    })
  }
}

pub const EXERCISE_SET_COLUMNS: &str = "es.id, es.remoteId, es.workoutId, es.exerciseId, \
   es.setNumber, es.reps, es.weight, es.createdAt, es.updatedAt, es.deletedAt, es.lastSyncedAt, \
   es.syncStatus";

pub struct RawExerciseSet {
  pub id:          String,
  pub workout_id:  String,
  pub exercise_id: String,
  pub set_number:  u32,
  pub reps:        Option<u32>,
  pub weight:      Option<f64>,
  pub envelope:    RawEnvelope,
}

impl RawExerciseSet {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get("id")?,
      workout_id:  row.get("workoutId")?,
      exercise_id: row.get("exerciseId")?,
      set_number:  row.get("setNumber")?,
      reps:        row.get("reps")?,
      weight:      row.get("weight")?,
      envelope:    RawEnvelope::from_row(row)?,
    })
  }

  pub fn into_exercise_set(self) -> Result<ExerciseSet> {
    Ok(ExerciseSet {
      id:          decode_uuid(&self.id)?,
      workout_id:  decode_uuid(&self.workout_id)?,
      exercise_id: decode_uuid(&self.exercise_id)?,
      set_number:  self.set_number,
      reps:        self.reps.unwrap_or(0),
      weight:      self.weight.unwrap_or(0.0),
      envelope:    self.envelope.into_envelope()?,
    })
  }
}

// ─── Outbox rows ─────────────────────────────────────────────────────────────

pub const OUTBOX_COLUMNS: &str =
  "id, entityType, entityId, operation, payload, createdAt, updatedAt, status, error";

pub struct RawOutboxEntry {
  pub id:          String,
  pub entity_type: String,
  pub entity_id:   String,
  pub operation:   String,
  pub payload:     Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
  pub status:      String,
  pub error:       Option<String>,
}

impl RawOutboxEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get("id")?,
      entity_type: row.get("entityType")?,
      entity_id:   row.get("entityId")?,
      operation:   row.get("operation")?,
      payload:     row.get("payload")?,
      created_at:  row.get("createdAt")?,
      updated_at:  row.get("updatedAt")?,
      status:      row.get("status")?,
      error:       row.get("error")?,
    })
  }

  pub fn into_entry(self) -> Result<OutboxEntry> {
    let payload = match self.payload.as_deref() {
      Some(json) => serde_json::from_str(json)?,
      None => serde_json::Value::Object(Default::default()),
    };

    Ok(OutboxEntry {
      id: decode_uuid(&self.id)?,
      entity_type: decode_enum(&self.entity_type)?,
      entity_id: decode_uuid(&self.entity_id)?,
      operation: decode_enum(&self.operation)?,
      payload,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      status: decode_enum(&self.status)?,
      error: self.error,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_match_javascript_iso_strings() {
    let dt = decode_dt("2024-05-06T07:08:09.123Z").unwrap();
    assert_eq!(encode_dt(dt), "2024-05-06T07:08:09.123Z");
  }

  #[test]
  fn offset_timestamps_normalise_to_utc() {
    let dt = decode_dt("2024-05-06T09:08:09.123+02:00").unwrap();
    assert_eq!(encode_dt(dt), "2024-05-06T07:08:09.123Z");
  }

  #[test]
  fn garbage_timestamp_is_an_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }

  #[test]
  fn unknown_enum_value_is_a_core_error() {
    let err = decode_enum::<SyncStatus>("limbo").unwrap_err();
    assert!(matches!(err, Error::Core(liftlog_core::Error::UnknownVariant { .. })));
  }
}
