//! Integration tests for the SQLite repositories against in-memory stores.

use chrono::{Duration, TimeZone, Utc};
use liftlog_core::{
  exercise::{Exercise, ExercisePatch, NewExercise, PlanAttachment},
  remote::{RemoteExercise, RemoteStamps, RemoteTrainingPlan},
  repository::{
    ExerciseRepository, ExerciseSetRepository, OutboxQueue, SyncLedger, SyncStateStore,
    TrainingPlanRepository, UserRepository, WorkoutRepository,
  },
  sync::{
    CompactionReport, EntityType, NewOutboxEntry, OutboxOperation, OutboxStatus, Reconciled, SyncStatus,
    UpsertOutcome,
  },
  time,
  training_plan::{NewTrainingPlan, PlanScope, TrainingPlan, TrainingPlanPatch},
  user::{Credentials, CredentialsPatch, NewUser, User, DEFAULT_LOCAL_NAME},
  workout::{NewExerciseSet, NewWorkout, Workout},
};
use uuid::Uuid;

use crate::{migrations, Database, DatabaseOptions, Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

struct Fixture {
  store: SqliteStore,
  user:  User,
  plan:  TrainingPlan,
}

impl Fixture {
  async fn new() -> Self {
    let store = store().await;
    let user = store.users().get_or_create_local_user().await.unwrap();
    let plan = store
      .training_plans()
      .create(NewTrainingPlan { user_id: user.id, name: "Legs".into() })
      .await
      .unwrap();
    Self { store, user, plan }
  }

  fn scope(&self) -> PlanScope { PlanScope { user_id: self.user.id, training_plan_id: self.plan.id } }

  async fn plan(&self, name: &str) -> TrainingPlan {
    self
      .store
      .training_plans()
      .create(NewTrainingPlan { user_id: self.user.id, name: name.into() })
      .await
      .unwrap()
  }

  async fn exercise(&self, plan: &TrainingPlan, name: &str) -> Exercise {
    self
      .store
      .exercises()
      .create(NewExercise {
        user_id:          self.user.id,
        training_plan_id: plan.id,
        name:             name.into(),
        sets:             3,
      })
      .await
      .unwrap()
  }

  async fn workout(&self) -> Workout {
    self
      .store
      .workouts()
      .start(NewWorkout { user_id: self.user.id, training_plan_id: self.plan.id })
      .await
      .unwrap()
  }

  async fn log(&self, workout: &Workout, exercise: &Exercise, set_number: u32, weight: f64) {
    self
      .store
      .exercise_sets()
      .log(NewExerciseSet {
        workout_id: workout.id,
        exercise_id: exercise.id,
        set_number,
        reps: 8,
        weight,
      })
      .await
      .unwrap();
  }

  /// Pretend the sync driver delivered everything staged so far.
  async fn deliver_all(&self) {
    let outbox = self.store.outbox();
    for entry in outbox.list_pending().await.unwrap() {
      outbox.mark_status(entry.id, OutboxStatus::Sent, None).await.unwrap();
    }
  }
}

fn remote_plan(user_id: Uuid, remote_id: &str, name: &str, updated_at: chrono::DateTime<Utc>) -> RemoteTrainingPlan {
  RemoteTrainingPlan {
    remote_id: remote_id.into(),
    user_id,
    name: name.into(),
    stamps: RemoteStamps {
      created_at: Some(updated_at),
      updated_at: Some(updated_at),
      deleted_at: None,
    },
  }
}

// ─── Database handle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_first_callers_share_one_connection() {
  let db = Database::new(DatabaseOptions::memory());
  let (a, b) = (db.clone(), db.clone());

  let (ca, cb) = tokio::join!(a.connection(), b.connection());
  assert!(std::ptr::eq(ca.unwrap(), cb.unwrap()));
  assert_eq!(db.schema_version().await.unwrap(), migrations::latest_version());
}

#[tokio::test]
async fn failed_transaction_leaves_no_rows_behind() {
  let s = store().await;

  let result: crate::Result<()> = s
    .database()
    .run_in_transaction(|tx| {
      tx.execute("INSERT INTO sync_state (key, value) VALUES ('probe', 'written')", [])?;
      Err(Error::Metadata("boom".into()))
    })
    .await;
  assert!(matches!(result, Err(Error::Metadata(_))));

  assert_eq!(s.sync_state().get("probe".into()).await.unwrap(), None);
}

#[tokio::test]
async fn failed_mutation_rolls_back_entity_and_outbox() {
  let f = Fixture::new().await;
  let before = f.store.outbox().list_all().await.unwrap().len();

  // The outbox entry is written, then the set insert fails on its foreign
  // keys; neither may survive.
  let plan_id = f.plan.id;
  let result = f
    .store
    .database()
    .run_in_transaction(move |tx| {
      crate::outbox::enqueue(
        tx,
        &NewOutboxEntry::new(
          EntityType::TrainingPlan,
          plan_id,
          OutboxOperation::Update,
          serde_json::json!({ "id": plan_id }),
        ),
      )?;
      tx.execute(
        "INSERT INTO exercise_sets (id, workoutId, exerciseId, setNumber, createdAt, updatedAt, syncStatus)
         VALUES ('s1', 'missing', 'missing', 1, 'x', 'x', 'pending_create')",
        [],
      )?;
      Ok(())
    })
    .await;

  assert!(result.is_err());
  assert_eq!(f.store.outbox().list_all().await.unwrap().len(), before);
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("liftlog.db");

  let user_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    s.users().get_or_create_local_user().await.unwrap().id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.database().schema_version().await.unwrap(), migrations::latest_version());
  assert_eq!(s.users().current_user_id().await.unwrap(), Some(user_id));
  assert_eq!(s.users().get_or_create_local_user().await.unwrap().id, user_id);

  let journal_mode: String = s
    .database()
    .read(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(journal_mode.to_lowercase(), "wal");
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn local_user_is_created_once() {
  let s = store().await;

  let first = s.users().get_or_create_local_user().await.unwrap();
  let second = s.users().get_or_create_local_user().await.unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(first.name, DEFAULT_LOCAL_NAME);
  assert_eq!(first.envelope.sync_status, SyncStatus::PendingCreate);
  assert_eq!(s.users().current_user_id().await.unwrap(), Some(first.id));

  let staged = s.outbox().list_for_entity(first.id, EntityType::User).await.unwrap();
  assert_eq!(staged.len(), 1);
  assert_eq!(staged[0].operation, OutboxOperation::Create);
}

#[tokio::test]
async fn logged_out_device_reuses_first_live_user() {
  let s = store().await;
  let user = s.users().get_or_create_local_user().await.unwrap();

  s.users().log_out().await.unwrap();
  assert_eq!(s.users().current_user_id().await.unwrap(), None);

  assert_eq!(s.users().get_or_create_local_user().await.unwrap().id, user.id);
}

#[tokio::test]
async fn sign_up_stores_a_hash_and_log_in_verifies_it() {
  let s = store().await;
  let user = s
    .users()
    .sign_up(NewUser { name: "Ada".into(), mail: "ada@example.com".into(), password: "hunter2".into() })
    .await
    .unwrap();
  assert_eq!(s.users().current_user_id().await.unwrap(), Some(user.id));

  let id = user.id;
  let stored: String = s
    .database()
    .read(move |conn| {
      Ok(conn.query_row(
        "SELECT password FROM users WHERE id = ?1",
        [id.hyphenated().to_string()],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert!(stored.starts_with("$argon2"));
  assert!(!stored.contains("hunter2"));

  let staged = s.outbox().list_for_entity(user.id, EntityType::User).await.unwrap();
  assert!(staged[0].payload.get("password").is_none());

  s.users().log_out().await.unwrap();
  let logged_in = s
    .users()
    .log_in(Credentials { mail: "ada@example.com".into(), password: "hunter2".into() })
    .await
    .unwrap();
  assert_eq!(logged_in.id, user.id);
  assert_eq!(s.users().current_user_id().await.unwrap(), Some(user.id));

  let err = s
    .users()
    .log_in(Credentials { mail: "ada@example.com".into(), password: "wrong".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(liftlog_core::Error::InvalidCredentials)));
}

#[tokio::test]
async fn update_credentials_stages_an_update() {
  let s = store().await;
  let user = s.users().get_or_create_local_user().await.unwrap();
  s.outbox().clear_for_entity(user.id, EntityType::User).await.unwrap();

  let updated = s
    .users()
    .update_credentials(CredentialsPatch {
      user_id: user.id,
      mail: Some("me@example.com".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.name, DEFAULT_LOCAL_NAME);
  assert_eq!(updated.mail, "me@example.com");
  assert!(updated.envelope.updated_at > user.envelope.updated_at);

  let staged = s.outbox().list_for_entity(user.id, EntityType::User).await.unwrap();
  assert_eq!(staged.len(), 1);
  assert_eq!(staged[0].operation, OutboxOperation::Update);
}

#[tokio::test]
async fn deleting_a_user_cascades_and_forgets_it() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let workout = f.workout().await;
  f.log(&workout, &squat, 1, 100.0).await;

  f.store.users().soft_delete(f.user.id).await.unwrap();

  assert!(!f.store.users().exists(f.user.id).await.unwrap());
  assert_eq!(f.store.users().current_user_id().await.unwrap(), None);
  assert!(f.store.training_plans().list_by_user(f.user.id).await.unwrap().is_empty());
  let squat = f.store.exercises().get(squat.id).await.unwrap().unwrap();
  assert_eq!(squat.envelope.sync_status, SyncStatus::PendingDelete);
  let workout = f.store.workouts().get(workout.id).await.unwrap().unwrap();
  assert!(workout.envelope.is_deleted());
  assert!(f.store.exercise_sets().list_for_workout(workout.id).await.unwrap().is_empty());
}

// ─── Create / list / soft delete ─────────────────────────────────────────────

#[tokio::test]
async fn created_plan_is_listed_as_pending_create() {
  let f = Fixture::new().await;

  let plans = f.store.training_plans().list_by_user(f.user.id).await.unwrap();
  assert_eq!(plans.len(), 1);
  assert_eq!(plans[0].id, f.plan.id);
  assert_eq!(plans[0].envelope.sync_status, SyncStatus::PendingCreate);
  assert!(plans[0].envelope.deleted_at.is_none());

  let staged = f.store.outbox().list_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap();
  assert_eq!(staged.len(), 1);
  assert_eq!(staged[0].operation, OutboxOperation::Create);
  assert_eq!(staged[0].payload["name"], "Legs");
}

#[tokio::test]
async fn plans_are_listed_most_recently_updated_first() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;

  let ids: Vec<_> = f
    .store
    .training_plans()
    .list_by_user(f.user.id)
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.id)
    .collect();
  assert_eq!(ids, vec![push.id, f.plan.id]);
}

#[tokio::test]
async fn created_exercise_is_listed_for_its_plan() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;

  let listed = f.store.exercises().list_for_plan(f.scope()).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].id, squat.id);
  assert_eq!(listed[0].sets, 3);
  assert_eq!(listed[0].envelope.sync_status, SyncStatus::PendingCreate);
}

#[tokio::test]
async fn soft_deleted_plan_is_hidden_but_kept() {
  let f = Fixture::new().await;

  f.store.training_plans().soft_delete(f.plan.id).await.unwrap();

  assert!(f.store.training_plans().list_by_user(f.user.id).await.unwrap().is_empty());
  let kept = f.store.training_plans().get(f.plan.id).await.unwrap().unwrap();
  assert!(kept.envelope.deleted_at.is_some());
  assert_eq!(kept.envelope.sync_status, SyncStatus::PendingDelete);

  let staged = f.store.outbox().list_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap();
  assert_eq!(staged.last().unwrap().operation, OutboxOperation::Delete);
}

#[tokio::test]
async fn deleting_twice_stages_one_delete() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;

  f.store.exercises().soft_delete(squat.id).await.unwrap();
  f.store.exercises().soft_delete(squat.id).await.unwrap();

  let deletes = f
    .store
    .outbox()
    .list_for_entity(squat.id, EntityType::Exercise)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.operation == OutboxOperation::Delete)
    .count();
  assert_eq!(deletes, 1);
}

#[tokio::test]
async fn mutating_a_missing_row_is_not_found() {
  let f = Fixture::new().await;
  let before = f.store.outbox().list_all().await.unwrap().len();

  let err = f
    .store
    .training_plans()
    .rename(TrainingPlanPatch { id: Uuid::new_v4(), name: "Ghost".into() })
    .await
    .unwrap_err();
  assert!(err.is_not_found());

  let err = f.store.workouts().soft_delete(Uuid::new_v4()).await.unwrap_err();
  assert!(err.is_not_found());

  assert_eq!(f.store.outbox().list_all().await.unwrap().len(), before);
}

#[tokio::test]
async fn editing_a_deleted_row_is_not_found() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  f.store.exercises().soft_delete(squat.id).await.unwrap();

  let err = f
    .store
    .exercises()
    .update(ExercisePatch { id: squat.id, name: Some("Front squat".into()), sets: None })
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

// ─── Sync status transitions ─────────────────────────────────────────────────

#[tokio::test]
async fn edits_stay_pending_create_until_acknowledged() {
  let f = Fixture::new().await;

  let renamed = f
    .store
    .training_plans()
    .rename(TrainingPlanPatch { id: f.plan.id, name: "Lower".into() })
    .await
    .unwrap();
  assert_eq!(renamed.envelope.sync_status, SyncStatus::PendingCreate);
  assert!(renamed.envelope.updated_at > f.plan.envelope.updated_at);

  f.deliver_all().await;
  f.store
    .ledger()
    .acknowledge(EntityType::TrainingPlan, f.plan.id, Some("srv-7".into()))
    .await
    .unwrap();
  let acked = f.store.training_plans().get(f.plan.id).await.unwrap().unwrap();
  assert_eq!(acked.envelope.sync_status, SyncStatus::Synced);
  assert_eq!(acked.envelope.remote_id.as_deref(), Some("srv-7"));
  assert!(acked.envelope.last_synced_at.is_some());
  assert_eq!(acked.envelope.updated_at, renamed.envelope.updated_at);

  let edited = f
    .store
    .training_plans()
    .rename(TrainingPlanPatch { id: f.plan.id, name: "Lower body".into() })
    .await
    .unwrap();
  assert_eq!(edited.envelope.sync_status, SyncStatus::PendingUpdate);
  assert!(edited.envelope.updated_at > acked.envelope.updated_at);
}

#[tokio::test]
async fn acknowledge_keeps_rows_with_undelivered_work_pending() {
  let f = Fixture::new().await;

  f.store
    .ledger()
    .acknowledge(EntityType::TrainingPlan, f.plan.id, Some("srv-1".into()))
    .await
    .unwrap();

  let plan = f.store.training_plans().get(f.plan.id).await.unwrap().unwrap();
  assert_eq!(plan.envelope.sync_status, SyncStatus::PendingCreate);
  assert_eq!(plan.envelope.remote_id.as_deref(), Some("srv-1"));

  let err = f
    .store
    .ledger()
    .acknowledge(EntityType::Workout, Uuid::new_v4(), None)
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

// ─── Exercises and mappings ──────────────────────────────────────────────────

#[tokio::test]
async fn attaching_twice_keeps_one_mapping() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let attachment = PlanAttachment { training_plan_id: push.id, exercise_id: squat.id };

  assert!(f.store.exercises().add_existing_to_plan(attachment).await.unwrap());
  assert!(!f.store.exercises().add_existing_to_plan(attachment).await.unwrap());
  assert_eq!(f.store.exercises().attachment_count(attachment).await.unwrap(), 1);

  let home = PlanAttachment { training_plan_id: f.plan.id, exercise_id: squat.id };
  assert!(!f.store.exercises().add_existing_to_plan(home).await.unwrap());

  let mapping_entries = f
    .store
    .outbox()
    .list_all()
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.entity_type == EntityType::TrainingPlanExercise)
    .collect::<Vec<_>>();
  assert_eq!(mapping_entries.len(), 1);
  assert_eq!(mapping_entries[0].payload["trainingPlanId"], push.id.to_string());
}

#[tokio::test]
async fn acknowledging_a_mapping_requires_it_to_exist() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let attachment = PlanAttachment { training_plan_id: push.id, exercise_id: squat.id };
  assert!(f.store.exercises().add_existing_to_plan(attachment).await.unwrap());

  let mapping = f
    .store
    .outbox()
    .list_all()
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.entity_type == EntityType::TrainingPlanExercise)
    .expect("mapping entry");

  let ledger = f.store.ledger();
  ledger.acknowledge(EntityType::TrainingPlanExercise, mapping.entity_id, None).await.unwrap();

  let err = ledger
    .acknowledge(EntityType::TrainingPlanExercise, Uuid::new_v4(), Some("srv-x".into()))
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn available_exercises_exclude_attached_and_deleted_ones() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let bench = f.exercise(&push, "Bench").await;
  let curl = f.exercise(&push, "Curl").await;
  f.store.exercises().soft_delete(curl.id).await.unwrap();

  let available = f.store.exercises().list_available_for_plan(f.scope()).await.unwrap();
  let ids: Vec<_> = available.iter().map(|e| e.id).collect();
  assert_eq!(ids, vec![bench.id]);
  assert!(!ids.contains(&squat.id));

  f.store
    .exercises()
    .add_existing_to_plan(PlanAttachment { training_plan_id: f.plan.id, exercise_id: bench.id })
    .await
    .unwrap();
  let listed: Vec<_> =
    f.store.exercises().list_for_plan(f.scope()).await.unwrap().into_iter().map(|e| e.name).collect();
  assert_eq!(listed.len(), 2);
  assert!(listed.contains(&"Bench".to_owned()));
}

#[tokio::test]
async fn exercises_of_a_deleted_plan_are_not_listed() {
  let f = Fixture::new().await;
  f.exercise(&f.plan, "Squat").await;

  f.store.training_plans().soft_delete(f.plan.id).await.unwrap();

  assert!(f.store.exercises().list_for_plan(f.scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn exercise_update_patches_only_given_fields() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;

  let updated = f
    .store
    .exercises()
    .update(ExercisePatch { id: squat.id, name: None, sets: Some(5) })
    .await
    .unwrap();

  assert_eq!(updated.name, "Squat");
  assert_eq!(updated.sets, 5);
  let staged = f.store.outbox().list_for_entity(squat.id, EntityType::Exercise).await.unwrap();
  assert_eq!(staged.last().unwrap().operation, OutboxOperation::Update);
  assert_eq!(staged.last().unwrap().payload["sets"], 5);
}

#[tokio::test]
async fn deleting_a_plan_spares_exercises_shared_with_a_live_plan() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let lunge = f.exercise(&f.plan, "Lunge").await;
  f.store
    .exercises()
    .add_existing_to_plan(PlanAttachment { training_plan_id: push.id, exercise_id: lunge.id })
    .await
    .unwrap();
  let workout = f.workout().await;
  f.log(&workout, &squat, 1, 100.0).await;

  f.store.training_plans().soft_delete(f.plan.id).await.unwrap();

  let exercises = f.store.exercises();
  assert!(exercises.get(squat.id).await.unwrap().unwrap().envelope.is_deleted());
  assert!(!exercises.get(lunge.id).await.unwrap().unwrap().envelope.is_deleted());
  assert!(f.store.workouts().get(workout.id).await.unwrap().unwrap().envelope.is_deleted());
  assert!(f.store.exercise_sets().list_for_workout(workout.id).await.unwrap().is_empty());

  let push_scope = PlanScope { user_id: f.user.id, training_plan_id: push.id };
  let still_listed = f.store.exercises().list_for_plan(push_scope).await.unwrap();
  assert_eq!(still_listed.len(), 1);
  assert_eq!(still_listed[0].id, lunge.id);
}

// ─── Workouts and history ────────────────────────────────────────────────────

#[tokio::test]
async fn legs_squat_workout_history() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let workout = f.workout().await;
  f.log(&workout, &squat, 1, 100.0).await;

  let history = f.store.workouts().list_history(f.scope()).await.unwrap();

  assert_eq!(history.len(), 1);
  assert_eq!(history[0].workout.id, workout.id);
  assert_eq!(history[0].training_plan_name.as_deref(), Some("Legs"));
  assert_eq!(history[0].exercises.len(), 1);
  let group = &history[0].exercises[0];
  assert_eq!(group.exercise_name.as_deref(), Some("Squat"));
  assert_eq!(group.sets.len(), 1);
  assert_eq!(group.sets[0].reps, 8);
  assert_eq!(group.sets[0].weight, 100.0);
}

#[tokio::test]
async fn exercise_history_averages_one_workout() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let workout = f.workout().await;
  for (n, weight) in [(1, 90.0), (2, 100.0), (3, 110.0)] {
    f.log(&workout, &squat, n, weight).await;
  }

  let days = f.store.exercise_sets().history_by_exercise(squat.id).await.unwrap();

  assert_eq!(days.len(), 1);
  assert_eq!(days[0].date, workout.started_at);
  assert_eq!(days[0].avg, 100.0);
  let numbers: Vec<_> = days[0].sets.iter().map(|s| s.set).collect();
  assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn exercise_history_skips_deleted_workouts_and_sets() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let kept = f.workout().await;
  f.log(&kept, &squat, 1, 80.0).await;
  f.log(&kept, &squat, 2, 85.0).await;
  let dropped = f.workout().await;
  f.log(&dropped, &squat, 1, 200.0).await;

  let second = f.store.exercise_sets().list_for_workout(kept.id).await.unwrap()[1].id;
  f.store.exercise_sets().soft_delete(second).await.unwrap();
  f.store.workouts().soft_delete(dropped.id).await.unwrap();

  let days = f.store.exercise_sets().history_by_exercise(squat.id).await.unwrap();
  assert_eq!(days.len(), 1);
  assert_eq!(days[0].sets.len(), 1);
  assert_eq!(days[0].avg, 80.0);

  assert_eq!(f.store.workouts().list_history(f.scope()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn logging_a_set_bumps_its_workout() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let workout = f.workout().await;

  f.log(&workout, &squat, 1, 60.0).await;

  let bumped = f.store.workouts().get(workout.id).await.unwrap().unwrap();
  assert!(bumped.envelope.updated_at > workout.envelope.updated_at);
  assert_eq!(bumped.envelope.sync_status, SyncStatus::PendingCreate);
}

#[tokio::test]
async fn completing_a_workout_stamps_completed_at() {
  let f = Fixture::new().await;
  let workout = f.workout().await;

  let done = f.store.workouts().complete(workout.id).await.unwrap();

  assert!(done.is_completed());
  assert_eq!(done.completed_at, Some(done.envelope.updated_at));
  let staged = f.store.outbox().list_for_entity(workout.id, EntityType::Workout).await.unwrap();
  assert_eq!(staged.len(), 2);
  assert_eq!(staged[1].operation, OutboxOperation::Update);
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_remote_id_creates_one_synced_row() {
  let f = Fixture::new().await;
  let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

  let first = f
    .store
    .training_plans()
    .upsert_from_remote(remote_plan(f.user.id, "srv-9", "Pull", at))
    .await
    .unwrap();
  assert_eq!(first.outcome, UpsertOutcome::Created);

  let again = f
    .store
    .training_plans()
    .upsert_from_remote(remote_plan(f.user.id, "srv-9", "Pull", at))
    .await
    .unwrap();
  assert_eq!(again, Reconciled { local_id: first.local_id, outcome: UpsertOutcome::Stale });

  let plan = f.store.training_plans().get(first.local_id).await.unwrap().unwrap();
  assert_eq!(plan.envelope.sync_status, SyncStatus::Synced);
  assert_eq!(plan.envelope.remote_id.as_deref(), Some("srv-9"));
  assert_eq!(plan.envelope.updated_at, at);
  assert!(plan.envelope.last_synced_at.is_some());

  let pulls = f
    .store
    .training_plans()
    .list_by_user(f.user.id)
    .await
    .unwrap()
    .into_iter()
    .filter(|p| p.name == "Pull")
    .count();
  assert_eq!(pulls, 1);
  assert!(f.store.outbox().list_for_entity(first.local_id, EntityType::TrainingPlan).await.unwrap().is_empty());
}

#[tokio::test]
async fn older_remote_record_changes_nothing_but_clears_outbox() {
  let f = Fixture::new().await;
  f.store
    .ledger()
    .acknowledge(EntityType::TrainingPlan, f.plan.id, Some("srv-1".into()))
    .await
    .unwrap();
  let local = f
    .store
    .training_plans()
    .rename(TrainingPlanPatch { id: f.plan.id, name: "Legs v2".into() })
    .await
    .unwrap();
  assert!(!f.store.outbox().list_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap().is_empty());

  let stale = local.envelope.updated_at - Duration::days(30);
  let reconciled = f
    .store
    .training_plans()
    .upsert_from_remote(remote_plan(f.user.id, "srv-1", "Legs (server)", stale))
    .await
    .unwrap();

  assert_eq!(reconciled.local_id, f.plan.id);
  assert_eq!(reconciled.outcome, UpsertOutcome::Stale);
  let after = f.store.training_plans().get(f.plan.id).await.unwrap().unwrap();
  assert_eq!(after, local);
  assert!(f.store.outbox().list_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap().is_empty());
}

#[tokio::test]
async fn newer_remote_record_wins() {
  let f = Fixture::new().await;
  f.store
    .ledger()
    .acknowledge(EntityType::TrainingPlan, f.plan.id, Some("srv-1".into()))
    .await
    .unwrap();

  let newer = time::now() + Duration::days(1);
  let reconciled = f
    .store
    .training_plans()
    .upsert_from_remote(remote_plan(f.user.id, "srv-1", "Legs (server)", newer))
    .await
    .unwrap();

  assert_eq!(reconciled.outcome, UpsertOutcome::Applied);
  let after = f.store.training_plans().get(f.plan.id).await.unwrap().unwrap();
  assert_eq!(after.name, "Legs (server)");
  assert_eq!(after.envelope.updated_at, newer);
  assert_eq!(after.envelope.sync_status, SyncStatus::Synced);
  assert_eq!(after.envelope.created_at, f.plan.envelope.created_at);
}

#[tokio::test]
async fn redelivered_remote_record_is_stale() {
  let f = Fixture::new().await;
  let at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap() + Duration::microseconds(123_456);
  let plans = f.store.training_plans();

  let first = plans.upsert_from_remote(remote_plan(f.user.id, "srv-9", "Pull", at)).await.unwrap();
  let stored = plans.get(first.local_id).await.unwrap().unwrap();
  let again = plans.upsert_from_remote(remote_plan(f.user.id, "srv-9", "Pull", at)).await.unwrap();

  assert_eq!(first.outcome, UpsertOutcome::Created);
  assert_eq!(again, Reconciled { local_id: first.local_id, outcome: UpsertOutcome::Stale });
  let after = plans.get(first.local_id).await.unwrap().unwrap();
  assert_eq!(after.envelope.updated_at.timestamp_subsec_micros(), 123_000);
  assert_eq!(after.envelope.last_synced_at, stored.envelope.last_synced_at);
}

#[tokio::test]
async fn remote_exercise_is_attached_to_its_home_plan() {
  let f = Fixture::new().await;

  let reconciled = f
    .store
    .exercises()
    .upsert_from_remote(RemoteExercise {
      remote_id:        "srv-ex-1".into(),
      training_plan_id: f.plan.id,
      user_id:          f.user.id,
      name:             "Deadlift".into(),
      sets:             4,
      stamps:           RemoteStamps::default(),
    })
    .await
    .unwrap();

  let listed = f.store.exercises().list_for_plan(f.scope()).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].id, reconciled.local_id);
  assert_eq!(listed[0].envelope.sync_status, SyncStatus::Synced);
  assert!(f.store.outbox().list_pending().await.unwrap().iter().all(|e| e.entity_id != reconciled.local_id));
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn outbox_delivers_oldest_first() {
  let f = Fixture::new().await;
  let push = f.plan("Push").await;

  let pending = f.store.outbox().list_pending().await.unwrap();
  let order: Vec<_> = pending.iter().map(|e| e.entity_id).collect();
  assert_eq!(order, vec![f.user.id, f.plan.id, push.id]);
  assert!(pending.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn outbox_status_transitions() {
  let f = Fixture::new().await;
  let outbox = f.store.outbox();
  let pending = outbox.list_pending().await.unwrap();
  let (user_entry, plan_entry) = (&pending[0], &pending[1]);

  outbox.mark_status(user_entry.id, OutboxStatus::Sent, None).await.unwrap();
  outbox
    .mark_status(plan_entry.id, OutboxStatus::Failed, Some("503 Service Unavailable".into()))
    .await
    .unwrap();

  assert!(outbox.list_pending().await.unwrap().is_empty());
  let failed = outbox.list_by_status(OutboxStatus::Failed).await.unwrap();
  assert_eq!(failed.len(), 1);
  assert_eq!(failed[0].error.as_deref(), Some("503 Service Unavailable"));
  assert!(failed[0].updated_at >= plan_entry.updated_at);

  assert_eq!(outbox.requeue_failed().await.unwrap(), 1);
  let requeued = outbox.list_pending().await.unwrap();
  assert_eq!(requeued.len(), 1);
  assert_eq!(requeued[0].id, plan_entry.id);
  assert!(requeued[0].error.is_none());

  let err = outbox.mark_status(Uuid::new_v4(), OutboxStatus::Sent, None).await.unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn clear_for_entity_only_touches_that_entity() {
  let f = Fixture::new().await;
  let outbox = f.store.outbox();

  assert_eq!(outbox.clear_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap(), 1);
  assert_eq!(outbox.clear_for_entity(f.plan.id, EntityType::TrainingPlan).await.unwrap(), 0);

  let left = outbox.list_all().await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].entity_id, f.user.id);
}

// ─── Sync state ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_state_is_last_write_wins() {
  let s = store().await;
  let state = s.sync_state();

  assert_eq!(state.last_synced_at().await.unwrap(), None);
  assert!(state.get("migratedAt".into()).await.unwrap().is_some());

  let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
  state.set_last_synced_at(at).await.unwrap();
  assert_eq!(state.last_synced_at().await.unwrap().as_deref(), Some("2024-05-06T07:08:09.000Z"));

  state.set_last_sync_error(Some("offline".into())).await.unwrap();
  state.set_last_sync_error(Some("timeout".into())).await.unwrap();
  assert_eq!(state.last_sync_error().await.unwrap().as_deref(), Some("timeout"));

  state.set_last_sync_error(None).await.unwrap();
  assert_eq!(state.last_sync_error().await.unwrap(), None);
}

// ─── Compaction ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn compaction_purges_only_acknowledged_tombstones() {
  let f = Fixture::new().await;
  let squat = f.exercise(&f.plan, "Squat").await;
  let acked = f.workout().await;
  f.log(&acked, &squat, 1, 100.0).await;
  let unacked = f.workout().await;
  f.log(&unacked, &squat, 1, 110.0).await;

  f.store.workouts().soft_delete(acked.id).await.unwrap();
  f.store.workouts().soft_delete(unacked.id).await.unwrap();
  f.deliver_all().await;

  assert!(f.store.exercise_sets().history_by_exercise(squat.id).await.unwrap().is_empty());
  let acked_set_id: String = {
    let workout_id = acked.id.hyphenated().to_string();
    f.store
      .database()
      .read(move |conn| {
        Ok(conn.query_row("SELECT id FROM exercise_sets WHERE workoutId = ?1", [workout_id], |r| r.get(0))?)
      })
      .await
      .unwrap()
  };
  let ledger = f.store.ledger();
  ledger
    .acknowledge(EntityType::ExerciseSet, Uuid::parse_str(&acked_set_id).unwrap(), None)
    .await
    .unwrap();
  ledger.acknowledge(EntityType::Workout, acked.id, None).await.unwrap();

  let report = ledger.compact(time::now() + Duration::days(1)).await.unwrap();

  assert_eq!(report.exercise_sets, 1);
  assert_eq!(report.workouts, 1);
  assert_eq!(report.training_plans, 0);
  assert_eq!(report.users, 0);
  assert!(report.outbox > 0);
  assert!(f.store.workouts().get(acked.id).await.unwrap().is_none());
  assert!(f.store.workouts().get(unacked.id).await.unwrap().is_some());
  assert!(f.store.outbox().list_by_status(OutboxStatus::Sent).await.unwrap().is_empty());

  // Nothing newer than the cutoff is touched.
  let untouched = ledger.compact(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()).await.unwrap();
  assert_eq!(untouched, CompactionReport::default());
}
