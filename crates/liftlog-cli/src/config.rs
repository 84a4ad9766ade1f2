//! Runtime configuration: an optional TOML file layered under `LIFTLOG_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::{DateTime, Utc};
use liftlog_store_sqlite::DatabaseOptions;
use serde::Deserialize;

/// `database_path` value selecting a throwaway in-memory store.
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default = "default_database_path")]
  pub database_path:   PathBuf,
  /// Remote API endpoint, consumed by the sync driver.
  #[serde(default)]
  pub api_base_url:    Option<String>,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
  /// Age after which delivered outbox entries and acknowledged tombstones
  /// may be compacted away.
  #[serde(default = "default_retention_days")]
  pub retention_days:  u32,
}

fn default_database_path() -> PathBuf { PathBuf::from("~/.local/share/liftlog/liftlog.db") }

fn default_busy_timeout_ms() -> u64 { 5_000 }

fn default_retention_days() -> u32 { 30 }

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      database_path:   default_database_path(),
      api_base_url:    None,
      busy_timeout_ms: default_busy_timeout_ms(),
      retention_days:  default_retention_days(),
    }
  }
}

impl AppConfig {
  /// Read `path` if it exists, then apply `LIFTLOG_*` overrides.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("LIFTLOG"))
      .build()?
      .try_deserialize()
  }

  pub fn database_options(&self) -> DatabaseOptions {
    let options = if self.database_path.as_os_str() == IN_MEMORY {
      DatabaseOptions::memory()
    } else {
      DatabaseOptions::file(expand_tilde(&self.database_path))
    };
    DatabaseOptions { busy_timeout: Duration::from_millis(self.busy_timeout_ms), ..options }
  }

  /// The compaction cutoff relative to `now`. Retention reaching back past
  /// the Unix epoch clamps to it; no stored row is older, and earlier years
  /// have no RFC 3339 encoding.
  pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    chrono::Duration::try_days(i64::from(self.retention_days))
      .and_then(|retention| now.checked_sub_signed(retention))
      .map_or(DateTime::<Utc>::UNIX_EPOCH, |cutoff| cutoff.max(DateTime::<Utc>::UNIX_EPOCH))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
