//! Training plans: a user's named collections of exercises.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlan {
  pub id:       Uuid,
  pub user_id:  Uuid,
  pub name:     String,
  #[serde(flatten)]
  pub envelope: Envelope,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrainingPlan {
  pub user_id: Uuid,
  pub name:    String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingPlanPatch {
  pub id:   Uuid,
  pub name: String,
}

/// Selects the rows of one user that belong to one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanScope {
  pub user_id:          Uuid,
  pub training_plan_id: Uuid,
}
