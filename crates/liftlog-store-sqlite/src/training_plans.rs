//! [`SqliteTrainingPlans`]: named plans owned by a user.

use liftlog_core::{
  remote::RemoteTrainingPlan,
  repository::TrainingPlanRepository,
  sync::{EntityType, Envelope, OutboxOperation, Reconciled},
  time,
  training_plan::{NewTrainingPlan, TrainingPlan, TrainingPlanPatch},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  cascade,
  database::Database,
  encode::{encode_dt, encode_uuid, RawTrainingPlan, TRAINING_PLAN_COLUMNS},
  rows::{self, EnvelopeColumns},
  Error, Result,
};

#[derive(Clone)]
pub struct SqliteTrainingPlans {
  db: Database,
}

impl SqliteTrainingPlans {
  pub fn new(db: Database) -> Self { Self { db } }
}

fn get_plan(conn: &Connection, id: Uuid) -> Result<Option<TrainingPlan>> {
  conn
    .query_row(
      &format!("SELECT {TRAINING_PLAN_COLUMNS} FROM training_plans tp WHERE tp.id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawTrainingPlan::from_row,
    )
    .optional()?
    .map(RawTrainingPlan::into_training_plan)
    .transpose()
}

fn insert_plan(conn: &Connection, plan: &TrainingPlan) -> Result<()> {
  let e = EnvelopeColumns::from(&plan.envelope);
  conn.execute(
    "INSERT INTO training_plans
       (id, userId, name, remoteId, createdAt, updatedAt, deletedAt, lastSyncedAt, syncStatus)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(plan.id),
      encode_uuid(plan.user_id),
      plan.name,
      e.remote_id,
      e.created_at,
      e.updated_at,
      e.deleted_at,
      e.last_synced_at,
      e.sync_status,
    ],
  )?;
  Ok(())
}

impl TrainingPlanRepository for SqliteTrainingPlans {
  type Error = Error;

  async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<TrainingPlan>> {
    self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRAINING_PLAN_COLUMNS} FROM training_plans tp
           WHERE tp.userId = ?1 AND tp.deletedAt IS NULL
           ORDER BY tp.updatedAt DESC, tp.rowid DESC"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(user_id)], RawTrainingPlan::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTrainingPlan::into_training_plan).collect()
      })
      .await
  }

  async fn get(&self, id: Uuid) -> Result<Option<TrainingPlan>> {
    self.db.read(move |conn| get_plan(conn, id)).await
  }

  async fn create(&self, input: NewTrainingPlan) -> Result<TrainingPlan> {
    self
      .db
      .run_in_transaction(move |tx| {
        let plan = TrainingPlan {
          id:       Uuid::new_v4(),
          user_id:  input.user_id,
          name:     input.name,
          envelope: Envelope::pending_create(time::now()),
        };
        insert_plan(tx, &plan)?;
        rows::stage(tx, EntityType::TrainingPlan, plan.id, OutboxOperation::Create, &plan)?;
        Ok(plan)
      })
      .await
  }

  async fn rename(&self, input: TrainingPlanPatch) -> Result<TrainingPlan> {
    self
      .db
      .run_in_transaction(move |tx| {
        let state = rows::require_live(tx, EntityType::TrainingPlan, input.id)?;
        let (updated_at, sync_status) = rows::touch(&state);
        tx.execute(
          "UPDATE training_plans SET name = ?1, updatedAt = ?2, syncStatus = ?3 WHERE id = ?4",
          rusqlite::params![
            input.name,
            encode_dt(updated_at),
            sync_status.as_str(),
            encode_uuid(input.id)
          ],
        )?;
        let plan =
          get_plan(tx, input.id)?.ok_or_else(|| Error::not_found(EntityType::TrainingPlan, input.id))?;
        rows::stage(tx, EntityType::TrainingPlan, plan.id, OutboxOperation::Update, &plan)?;
        Ok(plan)
      })
      .await
  }

  async fn soft_delete(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| cascade::training_plan(tx, id).map(drop))
      .await
  }

  async fn upsert_from_remote(&self, remote: RemoteTrainingPlan) -> Result<Reconciled> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::reconcile(
          tx,
          EntityType::TrainingPlan,
          &remote.remote_id,
          &remote.stamps,
          |id, envelope| {
            insert_plan(tx, &TrainingPlan {
              id,
              user_id: remote.user_id,
              name: remote.name.clone(),
              envelope: envelope.clone(),
            })
          },
          |id, envelope| {
            let e = EnvelopeColumns::from(envelope);
            tx.execute(
              "UPDATE training_plans
               SET userId = ?1, name = ?2, updatedAt = ?3, deletedAt = ?4, lastSyncedAt = ?5,
                   syncStatus = ?6
               WHERE id = ?7",
              rusqlite::params![
                encode_uuid(remote.user_id),
                remote.name,
                e.updated_at,
                e.deleted_at,
                e.last_synced_at,
                e.sync_status,
                encode_uuid(id)
              ],
            )?;
            Ok(())
          },
        )
      })
      .await
  }
}
