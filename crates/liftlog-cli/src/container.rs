//! The composition root: one store handle, shared by every use-case.

use std::sync::Arc;

use liftlog_core::usecase::{
  AcknowledgeRemote, AddExistingExerciseToPlan, CompactStore, CompleteWorkout, CreateExercise,
  CreateTrainingPlan, GetExerciseHistory, GetOrCreateLocalUser, GetSyncValue, ListAvailableExercises,
  ListExercisesForPlan, ListPastWorkouts, ListPendingOutbox, ListTrainingPlans, LogExerciseSet, LogIn,
  LogOut, MarkOutboxStatus, RemoveTrainingPlan, RemoveWorkout, RenameTrainingPlan, RequeueFailedOutbox,
  SignUp, SoftDeleteExercise, StartWorkout, UpdateCredentials, UpdateExercise,
};
use liftlog_store_sqlite::{
  SqliteExerciseSets, SqliteExercises, SqliteLedger, SqliteOutbox, SqliteStore, SqliteSyncState,
  SqliteTrainingPlans, SqliteUsers, SqliteWorkouts,
};

pub struct Container {
  pub store: SqliteStore,

  pub get_or_create_local_user: GetOrCreateLocalUser<SqliteUsers>,
  pub sign_up:                  SignUp<SqliteUsers>,
  pub log_in:                   LogIn<SqliteUsers>,
  pub log_out:                  LogOut<SqliteUsers>,
  pub update_credentials:       UpdateCredentials<SqliteUsers>,

  pub list_training_plans:  ListTrainingPlans<SqliteTrainingPlans>,
  pub create_training_plan: CreateTrainingPlan<SqliteTrainingPlans>,
  pub rename_training_plan: RenameTrainingPlan<SqliteTrainingPlans>,
  pub remove_training_plan: RemoveTrainingPlan<SqliteTrainingPlans>,

  pub list_exercises_for_plan:       ListExercisesForPlan<SqliteExercises>,
  pub list_available_exercises:      ListAvailableExercises<SqliteExercises>,
  pub create_exercise:               CreateExercise<SqliteExercises>,
  pub add_existing_exercise_to_plan: AddExistingExerciseToPlan<SqliteExercises>,
  pub update_exercise:               UpdateExercise<SqliteExercises>,
  pub soft_delete_exercise:          SoftDeleteExercise<SqliteExercises>,

  pub start_workout:        StartWorkout<SqliteWorkouts>,
  pub complete_workout:     CompleteWorkout<SqliteWorkouts>,
  pub remove_workout:       RemoveWorkout<SqliteWorkouts>,
  pub list_past_workouts:   ListPastWorkouts<SqliteWorkouts>,
  pub log_exercise_set:     LogExerciseSet<SqliteExerciseSets>,
  pub get_exercise_history: GetExerciseHistory<SqliteExerciseSets>,

  pub list_pending_outbox:   ListPendingOutbox<SqliteOutbox>,
  pub mark_outbox_status:    MarkOutboxStatus<SqliteOutbox>,
  pub requeue_failed_outbox: RequeueFailedOutbox<SqliteOutbox>,
  pub acknowledge_remote:    AcknowledgeRemote<SqliteLedger>,
  pub compact_store:         CompactStore<SqliteLedger>,
  pub get_sync_value:        GetSyncValue<SqliteSyncState>,
}

impl Container {
  pub fn new(store: SqliteStore) -> Self {
    let users = Arc::new(store.users());
    let plans = Arc::new(store.training_plans());
    let exercises = Arc::new(store.exercises());
    let workouts = Arc::new(store.workouts());
    let sets = Arc::new(store.exercise_sets());
    let outbox = Arc::new(store.outbox());
    let ledger = Arc::new(store.ledger());
    let sync_state = Arc::new(store.sync_state());

    Self {
      get_or_create_local_user: GetOrCreateLocalUser::new(users.clone()),
      sign_up: SignUp::new(users.clone()),
      log_in: LogIn::new(users.clone()),
      log_out: LogOut::new(users.clone()),
      update_credentials: UpdateCredentials::new(users),

      list_training_plans: ListTrainingPlans::new(plans.clone()),
      create_training_plan: CreateTrainingPlan::new(plans.clone()),
      rename_training_plan: RenameTrainingPlan::new(plans.clone()),
      remove_training_plan: RemoveTrainingPlan::new(plans),

      list_exercises_for_plan: ListExercisesForPlan::new(exercises.clone()),
      list_available_exercises: ListAvailableExercises::new(exercises.clone()),
      create_exercise: CreateExercise::new(exercises.clone()),
      add_existing_exercise_to_plan: AddExistingExerciseToPlan::new(exercises.clone()),
      update_exercise: UpdateExercise::new(exercises.clone()),
      soft_delete_exercise: SoftDeleteExercise::new(exercises),

      start_workout: StartWorkout::new(workouts.clone()),
      complete_workout: CompleteWorkout::new(workouts.clone()),
      remove_workout: RemoveWorkout::new(workouts.clone()),
      list_past_workouts: ListPastWorkouts::new(workouts),
      log_exercise_set: LogExerciseSet::new(sets.clone()),
      get_exercise_history: GetExerciseHistory::new(sets),

      list_pending_outbox: ListPendingOutbox::new(outbox.clone()),
      mark_outbox_status: MarkOutboxStatus::new(outbox.clone()),
      requeue_failed_outbox: RequeueFailedOutbox::new(outbox),
      acknowledge_remote: AcknowledgeRemote::new(ledger.clone()),
      compact_store: CompactStore::new(ledger),
      get_sync_value: GetSyncValue::new(sync_state),

      store,
    }
  }
}
