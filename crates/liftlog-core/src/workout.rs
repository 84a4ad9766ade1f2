//! Workouts (one session of doing a plan) and the sets logged within them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
  pub id:               Uuid,
  pub training_plan_id: Uuid,
  pub user_id:          Uuid,
  pub started_at:       DateTime<Utc>,
  pub completed_at:     Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub envelope:         Envelope,
}

impl Workout {
  pub fn is_completed(&self) -> bool { self.completed_at.is_some() }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
  pub user_id:          Uuid,
  pub training_plan_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSet {
  pub id:          Uuid,
  pub workout_id:  Uuid,
  pub exercise_id: Uuid,
  pub set_number:  u32,
  pub reps:        u32,
  pub weight:      f64,
  #[serde(flatten)]
  pub envelope:    Envelope,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExerciseSet {
  pub workout_id:  Uuid,
  pub exercise_id: Uuid,
  pub set_number:  u32,
  #[serde(default)]
  pub reps:        u32,
  #[serde(default)]
  pub weight:      f64,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExerciseSetPatch {
  pub id:     Uuid,
  pub reps:   Option<u32>,
  pub weight: Option<f64>,
}
