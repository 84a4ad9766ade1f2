//! Exercises and their attachment to training plans.
//!
//! An exercise belongs to a user, not to a single plan: it is created inside
//! a "home" plan but can be attached to any number of others through the
//! `training_plan_exercises` mapping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id:               Uuid,
  /// The plan the exercise was created in.
  pub training_plan_id: Uuid,
  pub user_id:          Uuid,
  pub name:             String,
  /// Default number of sets to perform.
  pub sets:             u32,
  #[serde(flatten)]
  pub envelope:         Envelope,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExercise {
  pub user_id:          Uuid,
  pub training_plan_id: Uuid,
  pub name:             String,
  #[serde(default)]
  pub sets:             u32,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExercisePatch {
  pub id:   Uuid,
  pub name: Option<String>,
  pub sets: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAttachment {
  pub training_plan_id: Uuid,
  pub exercise_id:      Uuid,
}
