//! Records as the remote system returns them, consumed by the
//! `upsert_from_remote` reconciliation entry points.
//!
//! Foreign keys (`userId`, `trainingPlanId`, ...) are local ids; translating
//! remote references is the sync driver's job. Missing timestamps default to
//! the time of reconciliation.

use chrono::{DateTime, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit timestamps carried by every remote record.
///
/// The accessors truncate to whole milliseconds, the precision rows are
/// stored at, so a redelivered record compares equal to what it wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStamps {
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub deleted_at: Option<DateTime<Utc>>,
}

impl RemoteStamps {
  pub fn created_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    self.created_at.unwrap_or(now).trunc_subsecs(3)
  }

  pub fn updated_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    self.updated_at.unwrap_or(now).trunc_subsecs(3)
  }

  pub fn deleted(&self) -> Option<DateTime<Utc>> { self.deleted_at.map(|at| at.trunc_subsecs(3)) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
  pub remote_id: String,
  pub name:      String,
  #[serde(default)]
  pub mail:      String,
  #[serde(flatten)]
  pub stamps:    RemoteStamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrainingPlan {
  pub remote_id: String,
  pub user_id:   Uuid,
  pub name:      String,
  #[serde(flatten)]
  pub stamps:    RemoteStamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExercise {
  pub remote_id:        String,
  pub training_plan_id: Uuid,
  pub user_id:          Uuid,
  pub name:             String,
  #[serde(default)]
  pub sets:             u32,
  #[serde(flatten)]
  pub stamps:           RemoteStamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkout {
  pub remote_id:        String,
  pub training_plan_id: Uuid,
  pub user_id:          Uuid,
  #[serde(default)]
  pub started_at:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at:     Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub stamps:           RemoteStamps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExerciseSet {
  pub remote_id:   String,
  pub workout_id:  Uuid,
  pub exercise_id: Uuid,
  pub set_number:  u32,
  #[serde(default)]
  pub reps:        u32,
  #[serde(default)]
  pub weight:      f64,
  #[serde(flatten)]
  pub stamps:      RemoteStamps,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn remote_plan_parses_from_api_json() {
    let user_id = Uuid::new_v4();
    let plan: RemoteTrainingPlan = serde_json::from_value(serde_json::json!({
      "remoteId": "srv-42",
      "userId": user_id,
      "name": "Push",
      "createdAt": "2024-03-01T10:00:00.000Z",
      "updatedAt": "2024-03-02T10:00:00.000Z",
      "deletedAt": null,
    }))
    .unwrap();

    assert_eq!(plan.remote_id, "srv-42");
    assert_eq!(plan.user_id, user_id);
    assert!(plan.stamps.deleted_at.is_none());
    assert_eq!(
      plan.stamps.updated_at.unwrap().to_rfc3339(),
      "2024-03-02T10:00:00+00:00"
    );
  }

  #[test]
  fn missing_stamps_default_to_now() {
    let set: RemoteExerciseSet = serde_json::from_value(serde_json::json!({
      "remoteId": "srv-7",
      "workoutId": Uuid::new_v4(),
      "exerciseId": Uuid::new_v4(),
      "setNumber": 2,
    }))
    .unwrap();

    let now = crate::time::now();
    assert_eq!(set.stamps.updated_or(now), now);
    assert_eq!(set.reps, 0);
    assert_eq!(set.weight, 0.0);
  }

  #[test]
  fn stamps_truncate_to_stored_precision() {
    let stamps: RemoteStamps = serde_json::from_value(serde_json::json!({
      "updatedAt": "2024-03-02T10:00:00.123456Z",
      "deletedAt": "2024-03-02T11:00:00.987654Z",
    }))
    .unwrap();

    let now = crate::time::now();
    assert_eq!(stamps.updated_or(now).timestamp_subsec_micros(), 123_000);
    assert_eq!(stamps.deleted().unwrap().timestamp_subsec_micros(), 987_000);
    assert_eq!(stamps.created_or(now), now);
  }
}
