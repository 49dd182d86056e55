//! Error type for `paranoid-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// `save` was called for a row that was never inserted.
  #[error("record not found: {0}")]
  RecordNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
