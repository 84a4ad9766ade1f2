//! Statements shared by every entity table: envelope state lookups, the
//! soft-delete transition and remote-id matching.

use chrono::{DateTime, Utc};
use liftlog_core::{
  remote::RemoteStamps,
  sync::{EntityType, Envelope, NewOutboxEntry, OutboxOperation, Reconciled, SyncStatus, UpsertOutcome},
  time,
};
use rusqlite::{Connection, OptionalExtension as _};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{
  encode::{decode_dt, decode_enum, decode_uuid, encode_dt, encode_uuid},
  outbox, Error, Result,
};

/// Table backing an entity type.
pub fn table(entity: EntityType) -> &'static str {
  match entity {
    EntityType::User => "users",
    EntityType::TrainingPlan => "training_plans",
    EntityType::Exercise => "exercises",
    EntityType::Workout => "workouts",
    EntityType::ExerciseSet => "exercise_sets",
    EntityType::TrainingPlanExercise => "training_plan_exercises",
  }
}

/// The envelope fields a mutation needs to decide what to write.
#[derive(Debug, Clone, Copy)]
pub struct RowState {
  pub updated_at:  DateTime<Utc>,
  pub sync_status: SyncStatus,
  pub deleted:     bool,
}

pub fn row_state(conn: &Connection, entity: EntityType, id: Uuid) -> Result<Option<RowState>> {
  let raw: Option<(String, String, Option<String>)> = conn
    .query_row(
      &format!("SELECT updatedAt, syncStatus, deletedAt FROM {} WHERE id = ?1", table(entity)),
      rusqlite::params![encode_uuid(id)],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?;

  raw
    .map(|(updated_at, sync_status, deleted_at)| {
      Ok(RowState {
        updated_at:  decode_dt(&updated_at)?,
        sync_status: decode_enum(&sync_status)?,
        deleted:     deleted_at.is_some(),
      })
    })
    .transpose()
}

/// State of a row that may be mutated; `NotFound` if it is missing or
/// soft-deleted.
pub fn require_live(conn: &Connection, entity: EntityType, id: Uuid) -> Result<RowState> {
  match row_state(conn, entity, id)? {
    Some(state) if !state.deleted => Ok(state),
    _ => Err(Error::not_found(entity, id)),
  }
}

/// Mark a row deleted and stage its outbox `delete`.
///
/// Returns `false` without writing anything when the row is already
/// soft-deleted; `NotFound` when it does not exist.
pub fn soft_delete(conn: &Connection, entity: EntityType, id: Uuid) -> Result<bool> {
  let state = row_state(conn, entity, id)?.ok_or_else(|| Error::not_found(entity, id))?;
  if state.deleted {
    return Ok(false);
  }

  let at = encode_dt(time::next_after(state.updated_at));
  conn.execute(
    &format!(
      "UPDATE {} SET deletedAt = ?1, updatedAt = ?1, syncStatus = ?2 WHERE id = ?3",
      table(entity)
    ),
    rusqlite::params![at, SyncStatus::PendingDelete.as_str(), encode_uuid(id)],
  )?;
  outbox::enqueue(
    conn,
    &NewOutboxEntry::new(entity, id, OutboxOperation::Delete, json!({ "id": id, "deletedAt": at })),
  )?;
  Ok(true)
}

/// Ids selected by a single-parameter query, typically the live children of
/// a row about to be cascaded.
pub fn ids(conn: &Connection, sql: &str, parent_id: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(parent_id)], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.iter().map(|s| decode_uuid(s)).collect()
}

/// A local row matched by its remote id.
#[derive(Debug, Clone, Copy)]
pub struct RemoteMatch {
  pub id:         Uuid,
  pub updated_at: DateTime<Utc>,
}

pub fn find_by_remote_id(conn: &Connection, entity: EntityType, remote_id: &str) -> Result<Option<RemoteMatch>> {
  let raw: Option<(String, String)> = conn
    .query_row(
      &format!("SELECT id, updatedAt FROM {} WHERE remoteId = ?1 LIMIT 1", table(entity)),
      rusqlite::params![remote_id],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;

  raw
    .map(|(id, updated_at)| Ok(RemoteMatch { id: decode_uuid(&id)?, updated_at: decode_dt(&updated_at)? }))
    .transpose()
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Envelope values encoded for binding, in column order
/// `remoteId, createdAt, updatedAt, deletedAt, lastSyncedAt, syncStatus`.
pub struct EnvelopeColumns {
  pub remote_id:      Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
  pub deleted_at:     Option<String>,
  pub last_synced_at: Option<String>,
  pub sync_status:    &'static str,
}

impl From<&Envelope> for EnvelopeColumns {
  fn from(envelope: &Envelope) -> Self {
    Self {
      remote_id:      envelope.remote_id.clone(),
      created_at:     encode_dt(envelope.created_at),
      updated_at:     encode_dt(envelope.updated_at),
      deleted_at:     envelope.deleted_at.map(encode_dt),
      last_synced_at: envelope.last_synced_at.map(encode_dt),
      sync_status:    envelope.sync_status.as_str(),
    }
  }
}

/// Stage an outbox entry whose payload is the serialised record.
pub fn stage<T: Serialize>(
  conn: &Connection,
  entity: EntityType,
  id: Uuid,
  operation: OutboxOperation,
  record: &T,
) -> Result<Uuid> {
  let payload = serde_json::to_value(record)?;
  outbox::enqueue(conn, &NewOutboxEntry::new(entity, id, operation, payload))
}

/// The new `updatedAt` and `syncStatus` for a local edit of a live row.
pub fn touch(state: &RowState) -> (DateTime<Utc>, SyncStatus) {
  (time::next_after(state.updated_at), state.sync_status.after_local_update())
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// Merge a remote record into local storage by last-writer-wins.
///
/// With no row carrying `remote_id`, `insert` writes a new synced row under a
/// fresh local id. Otherwise `apply` overwrites the matched row only if the
/// remote `updatedAt` is strictly newer. Either way the entity's outbox is
/// cleared. Both closures receive the local id and the synced envelope to
/// write.
pub fn reconcile<I, A>(
  conn: &Connection,
  entity: EntityType,
  remote_id: &str,
  stamps: &RemoteStamps,
  insert: I,
  apply: A,
) -> Result<Reconciled>
where
  I: FnOnce(Uuid, &Envelope) -> Result<()>,
  A: FnOnce(Uuid, &Envelope) -> Result<()>,
{
  let now = time::now();
  let envelope = Envelope {
    remote_id:      Some(remote_id.to_owned()),
    created_at:     stamps.created_or(now),
    updated_at:     stamps.updated_or(now),
    deleted_at:     stamps.deleted(),
    last_synced_at: Some(now),
    sync_status:    SyncStatus::Synced,
  };

  let reconciled = match find_by_remote_id(conn, entity, remote_id)? {
    None => {
      let local_id = Uuid::new_v4();
      insert(local_id, &envelope)?;
      Reconciled { local_id, outcome: UpsertOutcome::Created }
    }
    Some(existing) if envelope.updated_at > existing.updated_at => {
      apply(existing.id, &envelope)?;
      Reconciled { local_id: existing.id, outcome: UpsertOutcome::Applied }
    }
    Some(existing) => Reconciled { local_id: existing.id, outcome: UpsertOutcome::Stale },
  };

  let cleared = outbox::clear_for_entity(conn, reconciled.local_id, entity)?;
  debug!(
    %entity,
    local_id = %reconciled.local_id,
    remote_id,
    outcome = ?reconciled.outcome,
    cleared,
    "Remote record reconciled"
  );
  Ok(reconciled)
}
