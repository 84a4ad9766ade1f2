//! Explicit child-before-parent soft deletes.
//!
//! Every affected row goes through [`rows::soft_delete`], so each one gets
//! its own `pending_delete` status and outbox `delete` entry. Callers run
//! these inside the transaction of the delete that triggered them.
//! Plan/exercise mappings are never soft-deleted; list queries already
//! filter on both ends of the mapping.

use liftlog_core::sync::EntityType;
use rusqlite::Connection;
use uuid::Uuid;

use crate::{
  rows::{self, ids},
  Error, Result,
};

/// Ensure the root exists, and report whether it is still live.
fn live_root(conn: &Connection, entity: EntityType, id: Uuid) -> Result<bool> {
  let state = rows::row_state(conn, entity, id)?.ok_or_else(|| Error::not_found(entity, id))?;
  Ok(!state.deleted)
}

/// A workout and its sets.
pub fn workout(conn: &Connection, id: Uuid) -> Result<bool> {
  if !live_root(conn, EntityType::Workout, id)? {
    return Ok(false);
  }
  for set_id in ids(
    conn,
    "SELECT id FROM exercise_sets WHERE workoutId = ?1 AND deletedAt IS NULL",
    id,
  )? {
    rows::soft_delete(conn, EntityType::ExerciseSet, set_id)?;
  }
  rows::soft_delete(conn, EntityType::Workout, id)
}

/// A plan, its workouts, and the exercises whose home plan it is unless they
/// are still attached to another live plan.
pub fn training_plan(conn: &Connection, id: Uuid) -> Result<bool> {
  if !live_root(conn, EntityType::TrainingPlan, id)? {
    return Ok(false);
  }
  for workout_id in ids(
    conn,
    "SELECT id FROM workouts WHERE trainingPlanId = ?1 AND deletedAt IS NULL",
    id,
  )? {
    workout(conn, workout_id)?;
  }
  for exercise_id in ids(
    conn,
    "SELECT ex.id FROM exercises ex
     WHERE ex.trainingPlanId = ?1 AND ex.deletedAt IS NULL
       AND NOT EXISTS (
         SELECT 1 FROM training_plan_exercises tpe
         JOIN training_plans tp ON tp.id = tpe.trainingPlanId
         WHERE tpe.exerciseId = ex.id AND tpe.trainingPlanId <> ?1 AND tp.deletedAt IS NULL
       )",
    id,
  )? {
    rows::soft_delete(conn, EntityType::Exercise, exercise_id)?;
  }
  rows::soft_delete(conn, EntityType::TrainingPlan, id)
}

/// A user and everything it owns.
pub fn user(conn: &Connection, id: Uuid) -> Result<bool> {
  if !live_root(conn, EntityType::User, id)? {
    return Ok(false);
  }
  for plan_id in ids(
    conn,
    "SELECT id FROM training_plans WHERE userId = ?1 AND deletedAt IS NULL",
    id,
  )? {
    training_plan(conn, plan_id)?;
  }
  for exercise_id in ids(conn, "SELECT id FROM exercises WHERE userId = ?1 AND deletedAt IS NULL", id)? {
    rows::soft_delete(conn, EntityType::Exercise, exercise_id)?;
  }
  for workout_id in ids(conn, "SELECT id FROM workouts WHERE userId = ?1 AND deletedAt IS NULL", id)? {
    workout(conn, workout_id)?;
  }
  rows::soft_delete(conn, EntityType::User, id)
}
