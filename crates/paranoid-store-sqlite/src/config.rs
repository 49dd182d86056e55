//! Connection settings for [`SqliteStore`](crate::SqliteStore).

use std::path::PathBuf;

use serde::Deserialize;

/// Where the database lives and how to open it. Deserialised from the
/// `[store]` table of the application config.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Database file. `:memory:` opens a private in-memory database.
  pub path:            PathBuf,
  /// How long a statement waits on a locked database before failing.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 { 5_000 }

impl StoreConfig {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), busy_timeout_ms: default_busy_timeout_ms() }
  }

  pub fn is_in_memory(&self) -> bool { self.path.as_os_str() == ":memory:" }
}
