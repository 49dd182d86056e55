//! Records and their soft-delete state.
//!
//! A record is deleted exactly when `deleted_at` is set; there is no separate
//! flag that could disagree with it. The primary key never changes across
//! delete and restore.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Identity of a row across models. Used as the cascade visited-set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
  pub model: String,
  pub pk:    Uuid,
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.model, self.pk)
  }
}

/// Input for [`Manager::create`](crate::manager::Manager::create).
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub model:  String,
  pub fields: BTreeMap<String, Value>,
}

impl NewRecord {
  pub fn new(model: impl Into<String>) -> Self {
    Self { model: model.into(), fields: BTreeMap::new() }
  }

  pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(field.into(), value.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub pk:         Uuid,
  pub model:      String,
  pub fields:     BTreeMap<String, Value>,
  pub created_at: DateTime<Utc>,
  deleted_at:     Option<DateTime<Utc>>,
}

impl Record {
  /// A fresh, not-deleted record with a new primary key.
  pub fn new(input: NewRecord) -> Self {
    Self {
      pk:         Uuid::new_v4(),
      model:      input.model,
      fields:     input.fields,
      created_at: Utc::now(),
      deleted_at: None,
    }
  }

  /// Rebuild a record read back from storage.
  pub fn from_parts(
    pk: Uuid,
    model: String,
    fields: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
  ) -> Self {
    Self { pk, model, fields, created_at, deleted_at }
  }

  pub fn key(&self) -> RecordKey {
    RecordKey { model: self.model.clone(), pk: self.pk }
  }

  pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

  pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
    self.fields.insert(field.into(), value.into());
  }

  pub fn is_soft_deleted(&self) -> bool { self.deleted_at.is_some() }

  pub fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }

  /// Mark deleted at `at`. A record that is already deleted keeps its
  /// original timestamp.
  pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
    self.deleted_at.get_or_insert(at);
  }

  pub fn mark_restored(&mut self) { self.deleted_at = None; }

  /// Take the deletion state of `stored`, the persisted copy of this row.
  pub(crate) fn sync_deletion(&mut self, stored: &Record) {
    self.deleted_at = stored.deleted_at;
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn phone() -> Record {
    Record::new(NewRecord::new("phone").set("number", "555-0100"))
  }

  #[test]
  fn new_record_is_not_deleted() {
    let r = phone();
    assert!(!r.is_soft_deleted());
    assert!(r.deleted_at().is_none());
    assert_eq!(r.get("number"), Some(&Value::from("555-0100")));
  }

  #[test]
  fn delete_then_restore_keeps_identity() {
    let mut r = phone();
    let before = r.clone();
    let at = Utc::now();

    r.mark_deleted(at);
    assert!(r.is_soft_deleted());
    assert_eq!(r.deleted_at(), Some(at));

    r.mark_restored();
    assert_eq!(r, before);
  }

  #[test]
  fn repeated_delete_keeps_first_timestamp() {
    let mut r = phone();
    let first = Utc::now();
    r.mark_deleted(first);
    r.mark_deleted(first + Duration::seconds(10));
    assert_eq!(r.deleted_at(), Some(first));
  }

  #[test]
  fn key_displays_model_and_pk() {
    let r = phone();
    assert_eq!(r.key().to_string(), format!("phone:{}", r.pk));
  }
}
