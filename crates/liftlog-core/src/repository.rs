//! Repository traits implemented by storage backends (e.g.
//! `liftlog-store-sqlite`).
//!
//! Every mutating method stamps `updatedAt`, sets the row's `syncStatus` and
//! stages a matching outbox entry, all in one transaction. List methods never
//! return soft-deleted rows. Backend errors are propagated, never swallowed.
//!
//! All methods return `Send` futures so the traits can be used from
//! multi-threaded async runtimes.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  exercise::{Exercise, ExercisePatch, NewExercise, PlanAttachment},
  history::{ExerciseHistoryDay, WorkoutHistory},
  remote::{RemoteExercise, RemoteExerciseSet, RemoteTrainingPlan, RemoteUser, RemoteWorkout},
  sync::{CompactionReport, EntityType, OutboxEntry, OutboxStatus, Reconciled},
  training_plan::{NewTrainingPlan, PlanScope, TrainingPlan, TrainingPlanPatch},
  user::{Credentials, CredentialsPatch, NewUser, User},
  workout::{ExerciseSet, ExerciseSetPatch, NewExerciseSet, NewWorkout, Workout},
};

/// Well-known sync-state keys.
pub const LAST_SYNCED_AT: &str = "lastSyncedAt";
pub const LAST_SYNC_ERROR: &str = "lastSyncError";

// ─── Users ───────────────────────────────────────────────────────────────────

pub trait UserRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The current user, creating a placeholder local user on first launch.
  fn get_or_create_local_user(&self) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Create an account-bound user and make it the current user.
  fn sign_up(&self, input: NewUser) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Verify credentials against a live user and make it the current user.
  fn log_in(&self, input: Credentials) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Forget the current user. Stored data is kept.
  fn log_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn current_user_id(&self) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// Retrieve a user by id, soft-deleted or not.
  fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Whether a live (not soft-deleted) user with this id exists.
  fn exists(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn update_credentials(
    &self,
    input: CredentialsPatch,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Soft-delete the user and everything it owns.
  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_from_remote(
    &self,
    remote: RemoteUser,
  ) -> impl Future<Output = Result<Reconciled, Self::Error>> + Send + '_;
}

// ─── Training plans ──────────────────────────────────────────────────────────

pub trait TrainingPlanRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Live plans of a user, most recently updated first.
  fn list_by_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TrainingPlan>, Self::Error>> + Send + '_;

  fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<TrainingPlan>, Self::Error>> + Send + '_;

  fn create(
    &self,
    input: NewTrainingPlan,
  ) -> impl Future<Output = Result<TrainingPlan, Self::Error>> + Send + '_;

  fn rename(
    &self,
    input: TrainingPlanPatch,
  ) -> impl Future<Output = Result<TrainingPlan, Self::Error>> + Send + '_;

  /// Soft-delete the plan, its workouts and their sets, and exercises that
  /// live only in this plan.
  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_from_remote(
    &self,
    remote: RemoteTrainingPlan,
  ) -> impl Future<Output = Result<Reconciled, Self::Error>> + Send + '_;
}

// ─── Exercises ───────────────────────────────────────────────────────────────

pub trait ExerciseRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Live exercises attached to a live plan, most recently updated first.
  fn list_for_plan(
    &self,
    scope: PlanScope,
  ) -> impl Future<Output = Result<Vec<Exercise>, Self::Error>> + Send + '_;

  /// Live exercises of the user not yet attached to the plan, by name.
  fn list_available_for_plan(
    &self,
    scope: PlanScope,
  ) -> impl Future<Output = Result<Vec<Exercise>, Self::Error>> + Send + '_;

  fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Exercise>, Self::Error>> + Send + '_;

  /// Create an exercise and attach it to its home plan.
  fn create(&self, input: NewExercise) -> impl Future<Output = Result<Exercise, Self::Error>> + Send + '_;

  /// Attach an existing exercise to a plan. Returns `false` when it was
  /// already attached.
  fn add_existing_to_plan(
    &self,
    input: PlanAttachment,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn update(&self, input: ExercisePatch) -> impl Future<Output = Result<Exercise, Self::Error>> + Send + '_;

  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_from_remote(
    &self,
    remote: RemoteExercise,
  ) -> impl Future<Output = Result<Reconciled, Self::Error>> + Send + '_;
}

// ─── Workouts ────────────────────────────────────────────────────────────────

pub trait WorkoutRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn start(&self, input: NewWorkout) -> impl Future<Output = Result<Workout, Self::Error>> + Send + '_;

  fn complete(&self, id: Uuid) -> impl Future<Output = Result<Workout, Self::Error>> + Send + '_;

  fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Workout>, Self::Error>> + Send + '_;

  /// Live workouts of a plan, newest first, each with its sets grouped by
  /// exercise.
  fn list_history(
    &self,
    scope: PlanScope,
  ) -> impl Future<Output = Result<Vec<WorkoutHistory>, Self::Error>> + Send + '_;

  /// Soft-delete the workout and its sets.
  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_from_remote(
    &self,
    remote: RemoteWorkout,
  ) -> impl Future<Output = Result<Reconciled, Self::Error>> + Send + '_;
}

// ─── Exercise sets ───────────────────────────────────────────────────────────

pub trait ExerciseSetRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Log a set; also bumps the parent workout's `updatedAt`.
  fn log(&self, input: NewExerciseSet) -> impl Future<Output = Result<ExerciseSet, Self::Error>> + Send + '_;

  fn update(
    &self,
    input: ExerciseSetPatch,
  ) -> impl Future<Output = Result<ExerciseSet, Self::Error>> + Send + '_;

  /// Live sets of a workout ordered by exercise, then set number.
  fn list_for_workout(
    &self,
    workout_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ExerciseSet>, Self::Error>> + Send + '_;

  /// Sets of one exercise across all live workouts, grouped by the workout's
  /// start time, newest first.
  fn history_by_exercise(
    &self,
    exercise_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ExerciseHistoryDay>, Self::Error>> + Send + '_;

  fn soft_delete(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_from_remote(
    &self,
    remote: RemoteExerciseSet,
  ) -> impl Future<Output = Result<Reconciled, Self::Error>> + Send + '_;
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// The durable staging log read by the external sync driver.
///
/// Enqueueing is not part of this trait: entries are only ever written by the
/// repositories, inside the transaction of the mutation they describe.
pub trait OutboxQueue: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All `pending` entries, oldest first.
  fn list_pending(&self) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  fn list_by_status(
    &self,
    status: OutboxStatus,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  fn mark_status(
    &self,
    id: Uuid,
    status: OutboxStatus,
    error: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every entry for one entity. Returns the number removed.
  fn clear_for_entity(
    &self,
    entity_id: Uuid,
    entity_type: EntityType,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Move every `failed` entry back to `pending`. Returns the number moved.
  fn requeue_failed(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Sync state ──────────────────────────────────────────────────────────────

/// Last-write-wins key/value pairs describing the sync driver's progress.
pub trait SyncStateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get(&self, key: String) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  fn set(
    &self,
    key: String,
    value: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn last_synced_at(&self) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_ {
    self.get(LAST_SYNCED_AT.to_owned())
  }

  fn set_last_synced_at(
    &self,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.set(
      LAST_SYNCED_AT.to_owned(),
      Some(at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    )
  }

  fn last_sync_error(&self) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_ {
    self.get(LAST_SYNC_ERROR.to_owned())
  }

  /// Record (`Some`) or clear (`None`) the last sync failure.
  fn set_last_sync_error(
    &self,
    message: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.set(LAST_SYNC_ERROR.to_owned(), message)
  }
}

// ─── Acknowledgement and compaction ──────────────────────────────────────────

pub trait SyncLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Record that the remote has accepted the row's latest local state.
  fn acknowledge(
    &self,
    entity_type: EntityType,
    local_id: Uuid,
    remote_id: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Hard-delete delivered outbox entries and acknowledged tombstones older
  /// than `older_than`.
  fn compact(
    &self,
    older_than: DateTime<Utc>,
  ) -> impl Future<Output = Result<CompactionReport, Self::Error>> + Send + '_;
}
