//! [`SqliteUsers`]: local users, the account-bound sign-up/log-in flow and
//! the current-user pointer.
//!
//! The current user id lives in `metadata` under [`CURRENT_USER_KEY`].
//! Passwords are stored as argon2 PHC strings; the hash is never read into a
//! [`User`] and so never reaches an outbox payload.

use argon2::{
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use liftlog_core::{
  remote::RemoteUser,
  repository::UserRepository,
  sync::{EntityType, Envelope, OutboxOperation, Reconciled},
  time,
  user::{Credentials, CredentialsPatch, NewUser, User, DEFAULT_LOCAL_NAME},
};
use rand_core::OsRng;
use rusqlite::{Connection, OptionalExtension as _};
use tracing::info;
use uuid::Uuid;

use crate::{
  cascade,
  database::Database,
  encode::{decode_uuid, encode_dt, encode_uuid, RawUser, USER_COLUMNS},
  rows::{self, EnvelopeColumns},
  Error, Result,
};

pub const CURRENT_USER_KEY: &str = "current_user_id";

#[derive(Clone)]
pub struct SqliteUsers {
  db: Database,
}

impl SqliteUsers {
  pub fn new(db: Database) -> Self { Self { db } }

  /// Point the current user at an existing live user.
  pub async fn set_current_user(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::require_live(tx, EntityType::User, id)?;
        write_current(tx, Some(id))
      })
      .await
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawUser::from_row,
    )
    .optional()?
    .map(RawUser::into_user)
    .transpose()
}

fn first_live_user(conn: &Connection) -> Result<Option<User>> {
  conn
    .query_row(
      &format!(
        "SELECT {USER_COLUMNS} FROM users WHERE deletedAt IS NULL
         ORDER BY createdAt ASC, rowid ASC LIMIT 1"
      ),
      [],
      RawUser::from_row,
    )
    .optional()?
    .map(RawUser::into_user)
    .transpose()
}

fn read_current(conn: &Connection) -> Result<Option<Uuid>> {
  let raw: Option<Option<String>> = conn
    .query_row(
      "SELECT value FROM metadata WHERE key = ?1",
      rusqlite::params![CURRENT_USER_KEY],
      |row| row.get(0),
    )
    .optional()?;
  raw.flatten().map(|s| decode_uuid(&s)).transpose()
}

fn write_current(conn: &Connection, id: Option<Uuid>) -> Result<()> {
  match id {
    Some(id) => conn.execute(
      "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
      rusqlite::params![CURRENT_USER_KEY, encode_uuid(id)],
    )?,
    None => conn.execute("DELETE FROM metadata WHERE key = ?1", rusqlite::params![CURRENT_USER_KEY])?,
  };
  Ok(())
}

/// Insert a new `pending_create` user and stage its outbox `create`.
fn create_user(conn: &Connection, name: &str, mail: &str, password_hash: Option<&str>) -> Result<User> {
  let user = User {
    id:       Uuid::new_v4(),
    name:     name.to_owned(),
    mail:     mail.to_owned(),
    envelope: Envelope::pending_create(time::now()),
  };
  insert_user(conn, &user, password_hash)?;
  rows::stage(conn, EntityType::User, user.id, OutboxOperation::Create, &user)?;
  Ok(user)
}

fn insert_user(conn: &Connection, user: &User, password_hash: Option<&str>) -> Result<()> {
  let e = EnvelopeColumns::from(&user.envelope);
  conn.execute(
    "INSERT INTO users
       (id, name, mail, password, remoteId, createdAt, updatedAt, deletedAt, lastSyncedAt, syncStatus)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(user.id),
      user.name,
      user.mail,
      password_hash,
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

fn require_user(conn: &Connection, id: Uuid) -> Result<User> {
  get_user(conn, id)?.ok_or_else(|| Error::not_found(EntityType::User, id))
}

// ─── Password hashing ────────────────────────────────────────────────────────

async fn hash_password(password: String) -> Result<String> {
  tokio::task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| Error::PasswordHash(e.to_string()))
  })
  .await
  .map_err(|e| Error::PasswordHash(e.to_string()))?
}

/// Whether `password` matches the PHC string `hash`. Malformed hashes never
/// match.
async fn verify_password(password: String, hash: String) -> Result<bool> {
  tokio::task::spawn_blocking(move || {
    let Ok(parsed) = PasswordHash::new(&hash) else {
      return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
  })
  .await
  .map_err(|e| Error::PasswordHash(e.to_string()))
}

// ─── Repository ──────────────────────────────────────────────────────────────

impl UserRepository for SqliteUsers {
  type Error = Error;

  async fn get_or_create_local_user(&self) -> Result<User> {
    self
      .db
      .run_in_transaction(|tx| {
        let current = match read_current(tx)? {
          Some(id) => get_user(tx, id)?.filter(|u| !u.envelope.is_deleted()),
          None => None,
        };
        if let Some(user) = current {
          return Ok(user);
        }

        let user = match first_live_user(tx)? {
          Some(user) => user,
          None => {
            let user = create_user(tx, DEFAULT_LOCAL_NAME, "", None)?;
            info!(user_id = %user.id, "Local user created");
            user
          }
        };
        write_current(tx, Some(user.id))?;
        Ok(user)
      })
      .await
  }

  async fn sign_up(&self, input: NewUser) -> Result<User> {
    let hash = hash_password(input.password).await?;
    self
      .db
      .run_in_transaction(move |tx| {
        let user = create_user(tx, &input.name, &input.mail, Some(&hash))?;
        write_current(tx, Some(user.id))?;
        info!(user_id = %user.id, "User signed up");
        Ok(user)
      })
      .await
  }

  async fn log_in(&self, input: Credentials) -> Result<User> {
    let mail = input.mail.clone();
    let candidates: Vec<(String, String)> = self
      .db
      .read(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, password FROM users
           WHERE mail = ?1 AND deletedAt IS NULL AND password IS NOT NULL
           ORDER BY createdAt ASC, rowid ASC",
        )?;
        let found = stmt
          .query_map(rusqlite::params![mail], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(found)
      })
      .await?;

    for (id, hash) in candidates {
      if verify_password(input.password.clone(), hash).await? {
        let id = decode_uuid(&id)?;
        return self
          .db
          .run_in_transaction(move |tx| {
            let user = require_user(tx, id)?;
            write_current(tx, Some(user.id))?;
            info!(user_id = %user.id, "User logged in");
            Ok(user)
          })
          .await;
      }
    }
    Err(liftlog_core::Error::InvalidCredentials.into())
  }

  async fn log_out(&self) -> Result<()> {
    self.db.run_in_transaction(|tx| write_current(tx, None)).await
  }

  async fn current_user_id(&self) -> Result<Option<Uuid>> {
    self.db.read(|conn| read_current(conn)).await
  }

  async fn get(&self, id: Uuid) -> Result<Option<User>> {
    self.db.read(move |conn| get_user(conn, id)).await
  }

  async fn exists(&self, id: Uuid) -> Result<bool> {
    self
      .db
      .read(move |conn| {
        Ok(rows::row_state(conn, EntityType::User, id)?.is_some_and(|state| !state.deleted))
      })
      .await
  }

  async fn update_credentials(&self, input: CredentialsPatch) -> Result<User> {
    let hash = match input.password {
      Some(password) => Some(hash_password(password).await?),
      None => None,
    };
    let CredentialsPatch { user_id, name, mail, .. } = input;

    self
      .db
      .run_in_transaction(move |tx| {
        let state = rows::require_live(tx, EntityType::User, user_id)?;
        let (updated_at, sync_status) = rows::touch(&state);
        tx.execute(
          "UPDATE users
           SET name = COALESCE(?1, name), mail = COALESCE(?2, mail), password = COALESCE(?3, password),
               updatedAt = ?4, syncStatus = ?5
           WHERE id = ?6",
          rusqlite::params![
            name,
            mail,
            hash,
            encode_dt(updated_at),
            sync_status.as_str(),
            encode_uuid(user_id)
          ],
        )?;
        let user = require_user(tx, user_id)?;
        rows::stage(tx, EntityType::User, user.id, OutboxOperation::Update, &user)?;
        Ok(user)
      })
      .await
  }

  async fn soft_delete(&self, id: Uuid) -> Result<()> {
    self
      .db
      .run_in_transaction(move |tx| {
        if cascade::user(tx, id)? && read_current(tx)? == Some(id) {
          write_current(tx, None)?;
        }
        Ok(())
      })
      .await
  }

  async fn upsert_from_remote(&self, remote: RemoteUser) -> Result<Reconciled> {
    self
      .db
      .run_in_transaction(move |tx| {
        rows::reconcile(
          tx,
          EntityType::User,
          &remote.remote_id,
          &remote.stamps,
          |id, envelope| {
            let user = User {
              id,
              name: remote.name.clone(),
              mail: remote.mail.clone(),
              envelope: envelope.clone(),
            };
            insert_user(tx, &user, None)
          },
          |id, envelope| {
            let e = EnvelopeColumns::from(envelope);
            tx.execute(
              "UPDATE users
               SET name = ?1, mail = ?2, updatedAt = ?3, deletedAt = ?4, lastSyncedAt = ?5, syncStatus = ?6
               WHERE id = ?7",
              rusqlite::params![
                remote.name,
                remote.mail,
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
