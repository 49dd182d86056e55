//! Error types for `paranoid-core`.
//!
//! The lookup variants (`DoesNotExist`, `SoftDeleted`, `IsNotSoftDeleted`,
//! `MultipleObjectsReturned`) are distinct so callers can branch on them, e.g.
//! restore a soft-deleted row instead of creating a new one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  // ── Lookups ───────────────────────────────────────────────────────────

  #[error("{model} matching query does not exist")]
  DoesNotExist { model: String },

  #[error("{model} matching query is soft-deleted")]
  SoftDeleted { model: String },

  #[error("{model} matching query is not soft-deleted")]
  IsNotSoftDeleted { model: String },

  #[error("get() returned more than one {model} ({count} rows)")]
  MultipleObjectsReturned { model: String, count: usize },

  // ── Schema and validation ─────────────────────────────────────────────

  #[error("unknown model: {0:?}")]
  UnknownModel(String),

  #[error("model {0:?} is declared more than once")]
  DuplicateModel(String),

  #[error("unknown field {field:?} on model {model:?}")]
  UnknownField { model: String, field: String },

  #[error("field {field:?} on model {model:?} is declared more than once")]
  DuplicateField { model: String, field: String },

  #[error("field name {0:?} is reserved")]
  ReservedField(String),

  #[error("missing value for non-nullable field {field:?} on model {model:?}")]
  MissingField { model: String, field: String },

  #[error("field {field:?} on model {model:?} expects {expected}, got {found}")]
  TypeMismatch {
    model:    String,
    field:    String,
    expected: String,
    found:    String,
  },

  #[error("cannot parse {input:?} as {expected}")]
  Parse { input: String, expected: String },

  #[error("unknown relation {relation:?} on model {model:?}")]
  UnknownRelation { model: String, relation: String },

  #[error("invalid relation {relation:?} on model {model:?}: {reason}")]
  InvalidRelation {
    model:    String,
    relation: String,
    reason:   String,
  },

  #[error("relation {relation:?} on model {model:?} is not many-to-many")]
  NotManyToMany { model: String, relation: String },

  #[error("one-to-one relation {relation:?} on model {model:?} is already taken")]
  OneToOneTaken { model: String, relation: String },

  #[error("model {0:?} does not support soft delete")]
  NotParanoid(String),

  // ── Storage ───────────────────────────────────────────────────────────

  /// A failure reported by the [`RecordStore`](crate::store::RecordStore).
  /// Propagated unchanged; nothing is retried.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// `true` for the four lookup outcomes, as opposed to schema or storage
  /// failures.
  pub fn is_lookup(&self) -> bool {
    matches!(
      self,
      Self::DoesNotExist { .. }
        | Self::SoftDeleted { .. }
        | Self::IsNotSoftDeleted { .. }
        | Self::MultipleObjectsReturned { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
