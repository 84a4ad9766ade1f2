//! [`SqliteOutbox`]: the durable log of mutations awaiting delivery.
//!
//! Entries are written with [`enqueue`] inside the transaction of the
//! mutation they describe, so the entity change and its outbox record commit
//! or roll back together. Network delivery, retry and backoff belong to the
//! external sync driver, which reports back through [`OutboxQueue`].

use liftlog_core::{
  repository::OutboxQueue,
  sync::{EntityType, NewOutboxEntry, OutboxEntry, OutboxStatus},
  time,
};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::{
  database::Database,
  encode::{encode_dt, encode_uuid, RawOutboxEntry, OUTBOX_COLUMNS},
  Error, Result,
};

/// Stage `entry` as `pending` using the caller's connection or transaction.
pub fn enqueue(conn: &Connection, entry: &NewOutboxEntry) -> Result<Uuid> {
  let id = Uuid::new_v4();
  let at = encode_dt(time::now());
  let payload = serde_json::to_string(&entry.payload)?;

  conn.execute(
    "INSERT INTO outbox (id, entityType, entityId, operation, payload, createdAt, updatedAt, status, error)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, NULL)",
    rusqlite::params![
      encode_uuid(id),
      entry.entity_type.as_str(),
      encode_uuid(entry.entity_id),
      entry.operation.as_str(),
      payload,
      at,
      OutboxStatus::Pending.as_str(),
    ],
  )?;

  debug!(
    entity_type = %entry.entity_type,
    entity_id = %entry.entity_id,
    operation = entry.operation.as_str(),
    "Outbox entry staged"
  );
  Ok(id)
}

/// Delete every entry of one entity. Returns the number removed.
pub fn clear_for_entity(conn: &Connection, entity_id: Uuid, entity_type: EntityType) -> Result<usize> {
  Ok(conn.execute(
    "DELETE FROM outbox WHERE entityId = ?1 AND entityType = ?2",
    rusqlite::params![encode_uuid(entity_id), entity_type.as_str()],
  )?)
}

fn list_where_status(conn: &Connection, status: OutboxStatus) -> Result<Vec<OutboxEntry>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {OUTBOX_COLUMNS} FROM outbox WHERE status = ?1 ORDER BY createdAt ASC, rowid ASC"
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![status.as_str()], RawOutboxEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawOutboxEntry::into_entry).collect()
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteOutbox {
  db: Database,
}

impl SqliteOutbox {
  pub fn new(db: Database) -> Self { Self { db } }

  /// Stage an entry in a transaction of its own. Repositories use
  /// [`enqueue`] inside their own transaction instead.
  pub async fn enqueue(&self, entry: NewOutboxEntry) -> Result<Uuid> {
    self.db.run_in_transaction(move |tx| enqueue(tx, &entry)).await
  }

  /// Every entry regardless of status, oldest first.
  pub async fn list_all(&self) -> Result<Vec<OutboxEntry>> {
    self
      .db
      .read(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {OUTBOX_COLUMNS} FROM outbox ORDER BY createdAt ASC, rowid ASC"))?;
        let raws = stmt
          .query_map([], RawOutboxEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawOutboxEntry::into_entry).collect()
      })
      .await
  }

  /// Entries staged for one entity, oldest first.
  pub async fn list_for_entity(&self, entity_id: Uuid, entity_type: EntityType) -> Result<Vec<OutboxEntry>> {
    self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OUTBOX_COLUMNS} FROM outbox
           WHERE entityId = ?1 AND entityType = ?2
           ORDER BY createdAt ASC, rowid ASC"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![encode_uuid(entity_id), entity_type.as_str()],
            RawOutboxEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawOutboxEntry::into_entry).collect()
      })
      .await
  }
}

impl OutboxQueue for SqliteOutbox {
  type Error = Error;

  async fn list_pending(&self) -> Result<Vec<OutboxEntry>> {
    self.list_by_status(OutboxStatus::Pending).await
  }

  async fn list_by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxEntry>> {
    self.db.read(move |conn| list_where_status(conn, status)).await
  }

  async fn mark_status(&self, id: Uuid, status: OutboxStatus, error: Option<String>) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| {
        let changed = tx.execute(
          "UPDATE outbox SET status = ?1, error = ?2, updatedAt = ?3 WHERE id = ?4",
          rusqlite::params![status.as_str(), error, encode_dt(time::now()), encode_uuid(id)],
        )?;
        if changed == 0 {
          return Err(liftlog_core::Error::OutboxEntryNotFound(id).into());
        }
        debug!(%id, status = status.as_str(), "Outbox entry marked");
        Ok(())
      })
      .await
  }

  async fn clear_for_entity(&self, entity_id: Uuid, entity_type: EntityType) -> Result<usize> {
    self
      .db
      .run_in_transaction(move |tx| clear_for_entity(tx, entity_id, entity_type))
      .await
  }

  async fn requeue_failed(&self) -> Result<usize> {
    self
      .db
      .run_in_transaction(|tx| {
        Ok(tx.execute(
          "UPDATE outbox SET status = ?1, error = NULL, updatedAt = ?2 WHERE status = ?3",
          rusqlite::params![
            OutboxStatus::Pending.as_str(),
            encode_dt(time::now()),
            OutboxStatus::Failed.as_str()
          ],
        )?)
      })
      .await
  }
}
