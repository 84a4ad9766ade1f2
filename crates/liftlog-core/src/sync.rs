//! Sync metadata shared by every persisted entity, and the outbox records
//! that carry local mutations to the remote system.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// The kinds of record the outbox and the reconciliation layer know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
  User,
  TrainingPlan,
  Exercise,
  Workout,
  ExerciseSet,
  /// A plan/exercise attachment. Only ever created; it has no envelope.
  TrainingPlanExercise,
}

impl EntityType {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::TrainingPlan => "training_plan",
      Self::Exercise => "exercise",
      Self::Workout => "workout",
      Self::ExerciseSet => "exercise_set",
      Self::TrainingPlanExercise => "training_plan_exercise",
    }
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for EntityType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "user" => Ok(Self::User),
      "training_plan" => Ok(Self::TrainingPlan),
      "exercise" => Ok(Self::Exercise),
      "workout" => Ok(Self::Workout),
      "exercise_set" => Ok(Self::ExerciseSet),
      "training_plan_exercise" => Ok(Self::TrainingPlanExercise),
      other => Err(unknown("entity type", other)),
    }
  }
}

// ─── Row sync status ─────────────────────────────────────────────────────────

/// Where a row stands relative to the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
  Synced,
  PendingCreate,
  PendingUpdate,
  PendingDelete,
}

impl SyncStatus {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Synced => "synced",
      Self::PendingCreate => "pending_create",
      Self::PendingUpdate => "pending_update",
      Self::PendingDelete => "pending_delete",
    }
  }

  /// Status after a local edit. A row the remote has never seen stays
  /// `pending_create`; the eventual create carries the edited fields.
  pub const fn after_local_update(self) -> Self {
    match self {
      Self::PendingCreate => Self::PendingCreate,
      _ => Self::PendingUpdate,
    }
  }
}

impl fmt::Display for SyncStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SyncStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "synced" => Ok(Self::Synced),
      "pending_create" => Ok(Self::PendingCreate),
      "pending_update" => Ok(Self::PendingUpdate),
      "pending_delete" => Ok(Self::PendingDelete),
      other => Err(unknown("sync status", other)),
    }
  }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Identity-independent metadata carried by every synced row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
  /// Set once the remote system has assigned an identifier; the
  /// reconciliation key.
  pub remote_id:      Option<String>,
  pub created_at:     DateTime<Utc>,
  /// Rewritten on every mutation; strictly increasing per row.
  pub updated_at:     DateTime<Utc>,
  /// Non-null means soft-deleted.
  pub deleted_at:     Option<DateTime<Utc>>,
  pub last_synced_at: Option<DateTime<Utc>>,
  pub sync_status:    SyncStatus,
}

impl Envelope {
  /// Envelope of a row created locally at `at`.
  pub fn pending_create(at: DateTime<Utc>) -> Self {
    Self {
      remote_id:      None,
      created_at:     at,
      updated_at:     at,
      deleted_at:     None,
      last_synced_at: None,
      sync_status:    SyncStatus::PendingCreate,
    }
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxOperation {
  Create,
  Update,
  Delete,
}

impl OutboxOperation {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Create => "create",
      Self::Update => "update",
      Self::Delete => "delete",
    }
  }
}

impl FromStr for OutboxOperation {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "create" => Ok(Self::Create),
      "update" => Ok(Self::Update),
      "delete" => Ok(Self::Delete),
      other => Err(unknown("outbox operation", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
  Pending,
  Sent,
  Failed,
}

impl OutboxStatus {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Sent => "sent",
      Self::Failed => "failed",
    }
  }
}

impl FromStr for OutboxStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "sent" => Ok(Self::Sent),
      "failed" => Ok(Self::Failed),
      other => Err(unknown("outbox status", other)),
    }
  }
}

/// A mutation to stage for delivery. Written inside the caller's transaction.
#[derive(Debug, Clone)]
pub struct NewOutboxEntry {
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub operation:   OutboxOperation,
  pub payload:     serde_json::Value,
}

impl NewOutboxEntry {
  pub fn new(
    entity_type: EntityType,
    entity_id: Uuid,
    operation: OutboxOperation,
    payload: serde_json::Value,
  ) -> Self {
    Self { entity_type, entity_id, operation, payload }
  }
}

/// A persisted outbox row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
  pub id:          Uuid,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub operation:   OutboxOperation,
  pub payload:     serde_json::Value,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub status:      OutboxStatus,
  pub error:       Option<String>,
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// What an upsert-from-remote did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
  /// No row carried the remote id; a new synced row was inserted.
  Created,
  /// The remote record was strictly newer and overwrote the local row.
  Applied,
  /// The local row was as new or newer; only its outbox was cleared.
  Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
  pub local_id: Uuid,
  pub outcome:  UpsertOutcome,
}

/// Rows removed by a compaction pass, per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionReport {
  pub outbox:                  usize,
  pub exercise_sets:           usize,
  pub training_plan_exercises: usize,
  pub workouts:                usize,
  pub exercises:               usize,
  pub training_plans:          usize,
  pub users:                   usize,
}

fn unknown(kind: &'static str, value: &str) -> Error {
  Error::UnknownVariant { kind, value: value.to_owned() }
}
