//! Users: the root owner of every other record.
//!
//! One local user per device in the primary flow. `mail` and a password hash
//! are only populated by the account-bound sign-up flow.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::Envelope;

/// Display name given to the placeholder user created on first launch.
pub const DEFAULT_LOCAL_NAME: &str = "Offline User";

/// A user row. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:       Uuid,
  pub name:     String,
  pub mail:     String,
  #[serde(flatten)]
  pub envelope: Envelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub name:     String,
  pub mail:     String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
  pub mail:     String,
  pub password: String,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPatch {
  pub user_id:  Uuid,
  pub name:     Option<String>,
  pub mail:     Option<String>,
  pub password: Option<String>,
}
