//! The `RecordStore` trait: what the engine needs from a storage backend.
//!
//! Implemented by storage backends (e.g. `paranoid-store-sqlite`). The engine
//! never talks to a database directly; it builds [`Query`] descriptors and
//! [`Transition`]s and hands them to the store.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  query::Query,
  record::{Record, RecordKey},
};

/// The two soft-delete state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
  Delete,
  Restore,
}

/// A delete or restore covering a root row and its cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub operation: Operation,
  /// Timestamp written to `deleted_at` by a delete. Rows that are already
  /// deleted keep their existing timestamp.
  pub at:        DateTime<Utc>,
  /// Rows to transition, without duplicates.
  pub keys:      Vec<RecordKey>,
}

/// Abstraction over the persisted row set.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded runtimes.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new row.
  fn insert<'a>(
    &'a self,
    record: &'a Record,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Overwrite the fields of an existing row. The deletion state is left
  /// alone; only [`apply`](Self::apply) changes it.
  fn save<'a>(
    &'a self,
    record: &'a Record,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Return the rows matching `query`, honouring its visibility. Results are
  /// ordered by creation time.
  fn select<'a>(
    &'a self,
    query: &'a Query,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;

  /// Count the rows matching `query`, honouring its visibility.
  fn count<'a>(
    &'a self,
    query: &'a Query,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Add a row to the many-to-many join table `through`. Join rows are
  /// undirected: linking twice, in either order, is a no-op.
  fn link<'a>(
    &'a self,
    through: &'a str,
    left: Uuid,
    right: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove the link between `left` and `right` from `through`, whichever
  /// order it was added in.
  fn unlink<'a>(
    &'a self,
    through: &'a str,
    left: Uuid,
    right: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Apply `transition` to every listed row atomically: either all rows
  /// transition or none do. Returns the number of rows found.
  fn apply<'a>(
    &'a self,
    transition: &'a Transition,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}
