//! Subcommands. Each one maps onto a single use-case and yields the JSON
//! printed on stdout.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use liftlog_core::{
  exercise::{ExercisePatch, NewExercise, PlanAttachment},
  repository::{OutboxQueue, SyncStateStore},
  sync::{EntityType, OutboxStatus},
  time,
  training_plan::{NewTrainingPlan, PlanScope, TrainingPlanPatch},
  usecase::UseCase,
  user::{Credentials, CredentialsPatch, NewUser},
  workout::{NewExerciseSet, NewWorkout},
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{config::AppConfig, container::Container};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// The current user and the account-bound flow.
  #[command(subcommand)]
  User(UserCommand),
  #[command(subcommand)]
  Plan(PlanCommand),
  #[command(subcommand)]
  Exercise(ExerciseCommand),
  #[command(subcommand)]
  Workout(WorkoutCommand),
  /// Inspect and report on staged mutations.
  #[command(subcommand)]
  Outbox(OutboxCommand),
  #[command(subcommand)]
  Sync(SyncCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  /// Show the current user, creating the offline user on first use.
  Local,
  SignUp {
    #[arg(long)]
    name:     String,
    #[arg(long)]
    mail:     String,
    #[arg(long)]
    password: String,
  },
  LogIn {
    #[arg(long)]
    mail:     String,
    #[arg(long)]
    password: String,
  },
  LogOut,
  /// Change the current user's name, mail or password.
  Update {
    #[arg(long)]
    name:     Option<String>,
    #[arg(long)]
    mail:     Option<String>,
    #[arg(long)]
    password: Option<String>,
  },
}

/// Acts on behalf of `--user`, or the current user when omitted.
#[derive(Args, Debug, Clone, Copy)]
pub struct Owner {
  #[arg(long)]
  user: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
  List {
    #[command(flatten)]
    owner: Owner,
  },
  Create {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    name:  String,
  },
  Rename {
    #[arg(long)]
    id:   Uuid,
    #[arg(long)]
    name: String,
  },
  Remove {
    #[arg(long)]
    id: Uuid,
  },
}

#[derive(Subcommand, Debug)]
pub enum ExerciseCommand {
  /// Exercises attached to a plan.
  List {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    plan:  Uuid,
  },
  /// Exercises that could still be attached to a plan.
  Available {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    plan:  Uuid,
  },
  Create {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    plan:  Uuid,
    #[arg(long)]
    name:  String,
    #[arg(long, default_value_t = 3)]
    sets:  u32,
  },
  Attach {
    #[arg(long)]
    plan:     Uuid,
    #[arg(long)]
    exercise: Uuid,
  },
  Update {
    #[arg(long)]
    id:   Uuid,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    sets: Option<u32>,
  },
  Remove {
    #[arg(long)]
    id: Uuid,
  },
}

#[derive(Subcommand, Debug)]
pub enum WorkoutCommand {
  Start {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    plan:  Uuid,
  },
  Complete {
    #[arg(long)]
    id: Uuid,
  },
  LogSet {
    #[arg(long)]
    workout:    Uuid,
    #[arg(long)]
    exercise:   Uuid,
    #[arg(long)]
    set_number: u32,
    #[arg(long, default_value_t = 0)]
    reps:       u32,
    #[arg(long, default_value_t = 0.0)]
    weight:     f64,
  },
  /// Past workouts of a plan with their sets.
  History {
    #[command(flatten)]
    owner: Owner,
    #[arg(long)]
    plan:  Uuid,
  },
  /// Sets of one exercise grouped by workout date.
  ExerciseHistory {
    #[arg(long)]
    exercise: Uuid,
  },
  Remove {
    #[arg(long)]
    id: Uuid,
  },
}

#[derive(Subcommand, Debug)]
pub enum OutboxCommand {
  Pending,
  /// Record a delivery outcome for one entry.
  Mark {
    #[arg(long)]
    id:     Uuid,
    /// `pending`, `sent` or `failed`.
    #[arg(long)]
    status: OutboxStatus,
    #[arg(long)]
    error:  Option<String>,
  },
  /// Move every failed entry back to pending.
  Requeue,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
  /// Last sync time, last error and outbox backlog.
  Status,
  /// Read one raw sync-state value.
  Get {
    #[arg(long)]
    key: String,
  },
  /// Record that the remote accepted a row.
  Ack {
    /// e.g. `training_plan`, `exercise_set`.
    #[arg(long)]
    entity_type: EntityType,
    #[arg(long)]
    id:          Uuid,
    #[arg(long)]
    remote_id:   Option<String>,
  },
  /// Purge delivered entries and acknowledged deletes past retention.
  Compact {
    /// Overrides `retention_days` from the configuration.
    #[arg(long)]
    days: Option<u32>,
  },
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
  serde_json::to_value(value).context("failed to serialise output")
}

fn done() -> Value { json!({ "ok": true }) }

/// Run one command against the container.
pub async fn run(command: Command, app: &Container, config: &AppConfig) -> Result<Value> {
  match command {
    Command::User(cmd) => run_user(cmd, app).await,
    Command::Plan(cmd) => run_plan(cmd, app).await,
    Command::Exercise(cmd) => run_exercise(cmd, app).await,
    Command::Workout(cmd) => run_workout(cmd, app).await,
    Command::Outbox(cmd) => run_outbox(cmd, app).await,
    Command::Sync(cmd) => run_sync(cmd, app, config).await,
  }
}

async fn owner_id(app: &Container, owner: Owner) -> Result<Uuid> {
  match owner.user {
    Some(id) => Ok(id),
    None => Ok(
      app
        .get_or_create_local_user
        .execute(())
        .await
        .context("failed to resolve the current user")?
        .id,
    ),
  }
}

async fn scope(app: &Container, owner: Owner, plan: Uuid) -> Result<PlanScope> {
  Ok(PlanScope { user_id: owner_id(app, owner).await?, training_plan_id: plan })
}

async fn run_user(cmd: UserCommand, app: &Container) -> Result<Value> {
  match cmd {
    UserCommand::Local => to_json(app.get_or_create_local_user.execute(()).await?),
    UserCommand::SignUp { name, mail, password } => {
      to_json(app.sign_up.execute(NewUser { name, mail, password }).await.context("sign-up failed")?)
    }
    UserCommand::LogIn { mail, password } => {
      to_json(app.log_in.execute(Credentials { mail, password }).await.context("log-in failed")?)
    }
    UserCommand::LogOut => {
      app.log_out.execute(()).await?;
      Ok(done())
    }
    UserCommand::Update { name, mail, password } => {
      let user_id = owner_id(app, Owner { user: None }).await?;
      let patch = CredentialsPatch { user_id, name, mail, password };
      to_json(app.update_credentials.execute(patch).await?)
    }
  }
}

async fn run_plan(cmd: PlanCommand, app: &Container) -> Result<Value> {
  match cmd {
    PlanCommand::List { owner } => {
      let user_id = owner_id(app, owner).await?;
      to_json(app.list_training_plans.execute(user_id).await?)
    }
    PlanCommand::Create { owner, name } => {
      let user_id = owner_id(app, owner).await?;
      to_json(app.create_training_plan.execute(NewTrainingPlan { user_id, name }).await?)
    }
    PlanCommand::Rename { id, name } => {
      to_json(app.rename_training_plan.execute(TrainingPlanPatch { id, name }).await?)
    }
    PlanCommand::Remove { id } => {
      app.remove_training_plan.execute(id).await?;
      Ok(done())
    }
  }
}

async fn run_exercise(cmd: ExerciseCommand, app: &Container) -> Result<Value> {
  match cmd {
    ExerciseCommand::List { owner, plan } => {
      to_json(app.list_exercises_for_plan.execute(scope(app, owner, plan).await?).await?)
    }
    ExerciseCommand::Available { owner, plan } => {
      to_json(app.list_available_exercises.execute(scope(app, owner, plan).await?).await?)
    }
    ExerciseCommand::Create { owner, plan, name, sets } => {
      let user_id = owner_id(app, owner).await?;
      let input = NewExercise { user_id, training_plan_id: plan, name, sets };
      to_json(app.create_exercise.execute(input).await?)
    }
    ExerciseCommand::Attach { plan, exercise } => {
      let attachment = PlanAttachment { training_plan_id: plan, exercise_id: exercise };
      let attached = app.add_existing_exercise_to_plan.execute(attachment).await?;
      Ok(json!({ "attached": attached }))
    }
    ExerciseCommand::Update { id, name, sets } => {
      to_json(app.update_exercise.execute(ExercisePatch { id, name, sets }).await?)
    }
    ExerciseCommand::Remove { id } => {
      app.soft_delete_exercise.execute(id).await?;
      Ok(done())
    }
  }
}

async fn run_workout(cmd: WorkoutCommand, app: &Container) -> Result<Value> {
  match cmd {
    WorkoutCommand::Start { owner, plan } => {
      let user_id = owner_id(app, owner).await?;
      to_json(app.start_workout.execute(NewWorkout { user_id, training_plan_id: plan }).await?)
    }
    WorkoutCommand::Complete { id } => to_json(app.complete_workout.execute(id).await?),
    WorkoutCommand::LogSet { workout, exercise, set_number, reps, weight } => {
      let input = NewExerciseSet { workout_id: workout, exercise_id: exercise, set_number, reps, weight };
      to_json(app.log_exercise_set.execute(input).await?)
    }
    WorkoutCommand::History { owner, plan } => {
      to_json(app.list_past_workouts.execute(scope(app, owner, plan).await?).await?)
    }
    WorkoutCommand::ExerciseHistory { exercise } => {
      to_json(app.get_exercise_history.execute(exercise).await?)
    }
    WorkoutCommand::Remove { id } => {
      app.remove_workout.execute(id).await?;
      Ok(done())
    }
  }
}

async fn run_outbox(cmd: OutboxCommand, app: &Container) -> Result<Value> {
  match cmd {
    OutboxCommand::Pending => to_json(app.list_pending_outbox.execute(()).await?),
    OutboxCommand::Mark { id, status, error } => {
      app.mark_outbox_status.execute((id, status, error)).await?;
      Ok(done())
    }
    OutboxCommand::Requeue => {
      let requeued = app.requeue_failed_outbox.execute(()).await?;
      Ok(json!({ "requeued": requeued }))
    }
  }
}

async fn run_sync(cmd: SyncCommand, app: &Container, config: &AppConfig) -> Result<Value> {
  match cmd {
    SyncCommand::Status => {
      let state = app.store.sync_state();
      let outbox = app.store.outbox();
      Ok(json!({
        "apiBaseUrl": config.api_base_url,
        "schemaVersion": app.store.database().schema_version().await?,
        "lastSyncedAt": state.last_synced_at().await?,
        "lastSyncError": state.last_sync_error().await?,
        "pending": outbox.list_by_status(OutboxStatus::Pending).await?.len(),
        "failed": outbox.list_by_status(OutboxStatus::Failed).await?.len(),
      }))
    }
    SyncCommand::Get { key } => {
      let value = app.get_sync_value.execute(key.clone()).await?;
      Ok(json!({ "key": key, "value": value }))
    }
    SyncCommand::Ack { entity_type, id, remote_id } => {
      app.acknowledge_remote.execute((entity_type, id, remote_id)).await?;
      Ok(done())
    }
    SyncCommand::Compact { days } => {
      let config = AppConfig { retention_days: days.unwrap_or(config.retention_days), ..config.clone() };
      let cutoff = config.retention_cutoff(time::now());
      to_json(app.compact_store.execute(cutoff).await?)
    }
  }
}
