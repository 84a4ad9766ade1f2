//! Application services: one struct per operation, each exposing a single
//! [`UseCase::execute`]. This is the only surface a user interface touches.
//!
//! Use-cases hold their repository behind an [`Arc`] so a composition root
//! can share one backend between all of them.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  exercise::{Exercise, ExercisePatch, NewExercise, PlanAttachment},
  history::{ExerciseHistoryDay, WorkoutHistory},
  repository::{
    ExerciseRepository, ExerciseSetRepository, OutboxQueue, SyncLedger, SyncStateStore,
    TrainingPlanRepository, UserRepository, WorkoutRepository,
  },
  sync::{CompactionReport, EntityType, OutboxEntry, OutboxStatus},
  training_plan::{NewTrainingPlan, PlanScope, TrainingPlan, TrainingPlanPatch},
  user::{Credentials, CredentialsPatch, NewUser, User},
  workout::{ExerciseSet, NewExerciseSet, NewWorkout, Workout},
};

/// A single application operation.
pub trait UseCase: Send + Sync {
  type Input;
  type Output;
  type Error;

  fn execute(
    &self,
    input: Self::Input,
  ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send + '_;
}

macro_rules! use_case {
  (
    $(#[$meta:meta])*
    $name:ident<$bound:ident>($input:ty) -> $output:ty = |$repo:ident, $arg:pat_param| $call:expr
  ) => {
    $(#[$meta])*
    pub struct $name<R> {
      repo: Arc<R>,
    }

    impl<R> $name<R> {
      pub fn new(repo: Arc<R>) -> Self { Self { repo } }
    }

    impl<R> Clone for $name<R> {
      fn clone(&self) -> Self { Self { repo: Arc::clone(&self.repo) } }
    }

    impl<R: $bound> UseCase for $name<R> {
      type Input = $input;
      type Output = $output;
      type Error = R::Error;

      fn execute(
        &self,
        $arg: $input,
      ) -> impl Future<Output = Result<$output, R::Error>> + Send + '_ {
        let $repo = &*self.repo;
        $call
      }
    }
  };
}

// ─── Users ───────────────────────────────────────────────────────────────────

use_case! {
  /// Resolve the current user, creating the offline placeholder if needed.
  GetOrCreateLocalUser<UserRepository>(()) -> User = |repo, _| repo.get_or_create_local_user()
}

use_case! {
  SignUp<UserRepository>(NewUser) -> User = |repo, input| repo.sign_up(input)
}

use_case! {
  LogIn<UserRepository>(Credentials) -> User = |repo, input| repo.log_in(input)
}

use_case! {
  LogOut<UserRepository>(()) -> () = |repo, _| repo.log_out()
}

use_case! {
  UpdateCredentials<UserRepository>(CredentialsPatch) -> User =
    |repo, input| repo.update_credentials(input)
}

// ─── Training plans ──────────────────────────────────────────────────────────

use_case! {
  ListTrainingPlans<TrainingPlanRepository>(Uuid) -> Vec<TrainingPlan> =
    |repo, user_id| repo.list_by_user(user_id)
}

use_case! {
  CreateTrainingPlan<TrainingPlanRepository>(NewTrainingPlan) -> TrainingPlan =
    |repo, input| repo.create(input)
}

use_case! {
  RenameTrainingPlan<TrainingPlanRepository>(TrainingPlanPatch) -> TrainingPlan =
    |repo, input| repo.rename(input)
}

use_case! {
  RemoveTrainingPlan<TrainingPlanRepository>(Uuid) -> () = |repo, id| repo.soft_delete(id)
}

// ─── Exercises ───────────────────────────────────────────────────────────────

use_case! {
  ListExercisesForPlan<ExerciseRepository>(PlanScope) -> Vec<Exercise> =
    |repo, scope| repo.list_for_plan(scope)
}

use_case! {
  ListAvailableExercises<ExerciseRepository>(PlanScope) -> Vec<Exercise> =
    |repo, scope| repo.list_available_for_plan(scope)
}

use_case! {
  CreateExercise<ExerciseRepository>(NewExercise) -> Exercise = |repo, input| repo.create(input)
}

use_case! {
  /// Attach an existing exercise to another plan; a repeat is a no-op.
  AddExistingExerciseToPlan<ExerciseRepository>(PlanAttachment) -> bool =
    |repo, input| repo.add_existing_to_plan(input)
}

use_case! {
  UpdateExercise<ExerciseRepository>(ExercisePatch) -> Exercise = |repo, input| repo.update(input)
}

use_case! {
  SoftDeleteExercise<ExerciseRepository>(Uuid) -> () = |repo, id| repo.soft_delete(id)
}

// ─── Workouts ────────────────────────────────────────────────────────────────

use_case! {
  StartWorkout<WorkoutRepository>(NewWorkout) -> Workout = |repo, input| repo.start(input)
}

use_case! {
  CompleteWorkout<WorkoutRepository>(Uuid) -> Workout = |repo, id| repo.complete(id)
}

use_case! {
  RemoveWorkout<WorkoutRepository>(Uuid) -> () = |repo, id| repo.soft_delete(id)
}

use_case! {
  ListPastWorkouts<WorkoutRepository>(PlanScope) -> Vec<WorkoutHistory> =
    |repo, scope| repo.list_history(scope)
}

use_case! {
  LogExerciseSet<ExerciseSetRepository>(NewExerciseSet) -> ExerciseSet =
    |repo, input| repo.log(input)
}

use_case! {
  GetExerciseHistory<ExerciseSetRepository>(Uuid) -> Vec<ExerciseHistoryDay> =
    |repo, exercise_id| repo.history_by_exercise(exercise_id)
}

// ─── Sync ────────────────────────────────────────────────────────────────────

use_case! {
  ListPendingOutbox<OutboxQueue>(()) -> Vec<OutboxEntry> = |repo, _| repo.list_pending()
}

use_case! {
  /// Record a delivery outcome reported by the sync driver.
  MarkOutboxStatus<OutboxQueue>((Uuid, OutboxStatus, Option<String>)) -> () =
    |repo, (id, status, error)| repo.mark_status(id, status, error)
}

use_case! {
  RequeueFailedOutbox<OutboxQueue>(()) -> usize = |repo, _| repo.requeue_failed()
}

use_case! {
  /// Record that the remote accepted a row, optionally learning its remote id.
  AcknowledgeRemote<SyncLedger>((EntityType, Uuid, Option<String>)) -> () =
    |repo, (entity_type, local_id, remote_id)| repo.acknowledge(entity_type, local_id, remote_id)
}

use_case! {
  CompactStore<SyncLedger>(DateTime<Utc>) -> CompactionReport =
    |repo, older_than| repo.compact(older_than)
}

use_case! {
  GetSyncValue<SyncStateStore>(String) -> Option<String> = |repo, key| repo.get(key)
}
