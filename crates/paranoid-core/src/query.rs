//! Query descriptors: which model, which predicates, which rows are visible.
//!
//! A [`Query`] is plain data. Every chaining method returns a new descriptor
//! and leaves the receiver untouched, so links of a chain never share state.
//! Evaluation happens in [`QuerySet`](crate::manager::QuerySet), which asks the
//! store again on every call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, schema::Schema, value::Value};

// ─── Visibility ──────────────────────────────────────────────────────────────

/// Which rows a query evaluation returns with respect to soft deletion.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Visibility {
  /// Only rows that are not soft-deleted.
  #[default]
  ExcludeDeleted,
  /// Every row regardless of deletion state.
  IncludeDeleted,
  /// Only soft-deleted rows.
  DeletedOnly,
}

impl Visibility {
  /// `true` → [`IncludeDeleted`](Self::IncludeDeleted), `false` →
  /// [`ExcludeDeleted`](Self::ExcludeDeleted).
  pub fn with_deleted(with_deleted: bool) -> Self {
    if with_deleted {
      Self::IncludeDeleted
    } else {
      Self::ExcludeDeleted
    }
  }

  /// Whether a row in the given deletion state is visible.
  pub fn admits(self, is_soft_deleted: bool) -> bool {
    match self {
      Self::ExcludeDeleted => !is_soft_deleted,
      Self::IncludeDeleted => true,
      Self::DeletedOnly => is_soft_deleted,
    }
  }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// A single equality predicate. Conditions in a [`Filter`] are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
  /// `field = value` on a declared field of the queried model.
  Field { field: String, value: Value },
  /// Primary key equality.
  Pk(Uuid),
  /// Rows linked to `left` in the many-to-many join table `through`, on
  /// either side of the join row.
  Linked { through: String, left: Uuid },
}

/// Typed predicate builder. Field names and value types are checked against
/// the model when the query is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  conditions: Vec<Condition>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.conditions.push(Condition::Field {
      field: field.into(),
      value: value.into(),
    });
    self
  }

  pub fn pk(mut self, pk: Uuid) -> Self {
    self.conditions.push(Condition::Pk(pk));
    self
  }

  pub fn linked(mut self, through: impl Into<String>, left: Uuid) -> Self {
    self.conditions.push(Condition::Linked { through: through.into(), left });
    self
  }

  /// Both sets of conditions must hold.
  pub fn and(mut self, other: Filter) -> Self {
    self.conditions.extend(other.conditions);
    self
  }

  pub fn conditions(&self) -> &[Condition] { &self.conditions }

  pub fn is_empty(&self) -> bool { self.conditions.is_empty() }
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  pub model:      String,
  pub filter:     Filter,
  pub visibility: Visibility,
}

impl Query {
  /// All non-deleted rows of `model`.
  pub fn new(model: impl Into<String>) -> Self {
    Self {
      model:      model.into(),
      filter:     Filter::new(),
      visibility: Visibility::ExcludeDeleted,
    }
  }

  /// Keep the predicates, reset visibility from `with_deleted`.
  pub fn all(&self, with_deleted: bool) -> Self {
    self.with_visibility(Visibility::with_deleted(with_deleted))
  }

  /// Add predicates. `with_deleted: None` keeps the current visibility; an
  /// explicit value replaces it, so `Some(false)` hides deleted rows even after
  /// an earlier link widened the query.
  pub fn filter(&self, filter: Filter, with_deleted: Option<bool>) -> Self {
    let visibility = with_deleted.map_or(self.visibility, Visibility::with_deleted);
    Self {
      model: self.model.clone(),
      filter: self.filter.clone().and(filter),
      visibility,
    }
  }

  /// Only soft-deleted rows matching the predicates so far.
  pub fn deleted_only(&self) -> Self { self.with_visibility(Visibility::DeletedOnly) }

  pub fn with_visibility(&self, visibility: Visibility) -> Self {
    Self { visibility, ..self.clone() }
  }

  /// Check the model exists and every field predicate fits its declaration.
  pub fn validate(&self, schema: &Schema) -> Result<()> {
    let model = schema.model(&self.model)?;
    for condition in self.filter.conditions() {
      if let Condition::Field { field, value } = condition {
        model.check_value(field, value)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    Error,
    schema::{FieldDef, ModelDef},
  };

  fn phones() -> Query { Query::new("phone") }

  #[test]
  fn default_excludes_deleted() {
    assert_eq!(phones().visibility, Visibility::ExcludeDeleted);
    assert!(!Visibility::ExcludeDeleted.admits(true));
    assert!(Visibility::IncludeDeleted.admits(true));
    assert!(!Visibility::DeletedOnly.admits(false));
  }

  #[test]
  fn all_keeps_predicates() {
    let q = phones().filter(Filter::new().eq("number", "555"), None).all(true);
    assert_eq!(q.visibility, Visibility::IncludeDeleted);
    assert_eq!(q.filter.conditions().len(), 1);

    let narrowed = q.all(false);
    assert_eq!(narrowed.visibility, Visibility::ExcludeDeleted);
    assert_eq!(narrowed.filter, q.filter);
  }

  #[test]
  fn filter_inherits_widened_visibility() {
    let q = phones().all(true).filter(Filter::new().eq("number", "555"), None);
    assert_eq!(q.visibility, Visibility::IncludeDeleted);

    let q = phones().deleted_only().filter(Filter::new(), None);
    assert_eq!(q.visibility, Visibility::DeletedOnly);
  }

  #[test]
  fn explicit_false_wins_over_inherited_true() {
    let q = phones().all(true).filter(Filter::new(), Some(false));
    assert_eq!(q.visibility, Visibility::ExcludeDeleted);
  }

  #[test]
  fn deleted_only_overrides_any_prior_mode() {
    assert_eq!(phones().all(false).deleted_only().visibility, Visibility::DeletedOnly);
    assert_eq!(phones().all(true).deleted_only().visibility, Visibility::DeletedOnly);
  }

  #[test]
  fn chaining_leaves_receiver_untouched() {
    let base = phones();
    let _ = base.filter(Filter::new().eq("number", "1"), Some(true));
    assert_eq!(base, phones());
  }

  #[test]
  fn filters_compose_with_and() {
    let q = phones()
      .filter(Filter::new().eq("number", "1"), None)
      .filter(Filter::new().eq("label", "work"), None);
    assert_eq!(q.filter.conditions().len(), 2);
  }

  #[test]
  fn validate_checks_fields() {
    let schema = Schema::new([ModelDef::paranoid("phone").field(FieldDef::text("number"))]).unwrap();
    assert!(phones().filter(Filter::new().eq("number", "1"), None).validate(&schema).is_ok());
    assert!(matches!(
      phones().filter(Filter::new().eq("colour", "red"), None).validate(&schema),
      Err(Error::UnknownField { .. })
    ));
    assert!(matches!(Query::new("car").validate(&schema), Err(Error::UnknownModel(_))));
  }
}
