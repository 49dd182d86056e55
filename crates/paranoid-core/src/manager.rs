//! [`Manager`] — the entry point tying a [`Schema`] to a [`RecordStore`] — and
//! [`QuerySet`], the evaluating side of a [`Query`].
//!
//! ```rust,ignore
//! let people = Manager::new(store, schema);
//! let mut alice = people.create(NewRecord::new("person").set("name", "Alice")).await?;
//! people.delete(&mut alice).await?;
//!
//! let phones = people.related(&alice, "phones")?;
//! assert_eq!(phones.count().await?, 0);
//! assert_eq!(phones.all(true).count().await?, 3);
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
  Error, Result, cascade,
  query::{Filter, Query},
  record::{NewRecord, Record, RecordKey},
  schema::{FieldKind, ModelDef, RelationKind, Schema},
  store::{Operation, RecordStore, Transition},
};

// ─── Manager ─────────────────────────────────────────────────────────────────

struct Inner<S> {
  store:  S,
  schema: Schema,
}

/// Soft-delete-aware access to every model of a schema.
///
/// Cloning is cheap — the store and schema are reference-counted.
pub struct Manager<S> {
  inner: Arc<Inner<S>>,
}

impl<S> Clone for Manager<S> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<S: RecordStore> Manager<S> {
  pub fn new(store: S, schema: Schema) -> Self {
    Self { inner: Arc::new(Inner { store, schema }) }
  }

  pub fn store(&self) -> &S { &self.inner.store }

  pub fn schema(&self) -> &Schema { &self.inner.schema }

  /// Every non-deleted row of `model`.
  pub fn objects(&self, model: impl Into<String>) -> QuerySet<S> {
    self.query(Query::new(model))
  }

  /// Evaluate an arbitrary query descriptor.
  pub fn query(&self, query: Query) -> QuerySet<S> {
    QuerySet { manager: self.clone(), query }
  }

  /// The rows reached from `record` through `relation`, e.g.
  /// `related(&person, "phones")`. The result behaves like any other
  /// [`QuerySet`]: deleted rows are hidden until the caller widens it.
  pub fn related(&self, record: &Record, relation: &str) -> Result<QuerySet<S>> {
    let relation = self.schema().model(&record.model)?.relation_def(relation)?;
    Ok(self.query(relation.scope(record.pk)))
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Validate and persist a new row.
  ///
  /// A non-null foreign key must reference an existing row; a soft-deleted row
  /// still counts as existing.
  pub async fn create(&self, input: NewRecord) -> Result<Record> {
    let mut record = Record::new(input);
    let model = self.schema().model(&record.model)?;
    self.validate(model, &mut record).await?;

    self.store().insert(&record).await.map_err(Error::store)?;
    debug!(key = %record.key(), "record created");
    Ok(record)
  }

  /// Persist field edits made to `record`.
  ///
  /// Only fields are written. The deletion state changes through
  /// [`delete`](Self::delete) and [`restore`](Self::restore) alone, and is
  /// refreshed on `record` from the store afterwards.
  pub async fn save(&self, record: &mut Record) -> Result<()> {
    let model = self.schema().model(&record.model)?;
    self.validate(model, record).await?;
    self.store().save(record).await.map_err(Error::store)?;

    let stored = self.stored(&record.key()).await?;
    record.sync_deletion(&stored);
    Ok(())
  }

  async fn validate(&self, model: &ModelDef, record: &mut Record) -> Result<()> {
    model.validate_fields(&mut record.fields)?;

    for field in &model.fields {
      let FieldKind::ForeignKey { model: referenced } = &field.kind else {
        continue;
      };
      let Some(pk) = record.get(&field.name).and_then(|v| v.as_uuid()) else {
        continue;
      };

      let target = Query::new(referenced.clone()).filter(Filter::new().pk(pk), Some(true));
      if self.store().count(&target).await.map_err(Error::store)? == 0 {
        return Err(Error::DoesNotExist { model: referenced.clone() });
      }
    }

    self.check_one_to_one(model, record).await
  }

  /// Reject a second row on the target side of a one-to-one relation. Deleted
  /// rows still hold their slot, so a restore never produces two.
  async fn check_one_to_one(&self, model: &ModelDef, record: &Record) -> Result<()> {
    for source in self.schema().models() {
      for relation in &source.relations {
        let field = match &relation.kind {
          RelationKind::HasOne { field } if relation.target == model.name => field,
          _ => continue,
        };
        let Some(pk) = record.get(field).and_then(|v| v.as_uuid()) else {
          continue;
        };

        let holders = Query::new(model.name.clone())
          .filter(Filter::new().eq(field.clone(), pk), Some(true));
        let rows = self.store().select(&holders).await.map_err(Error::store)?;
        if rows.iter().any(|r| r.pk != record.pk) {
          return Err(Error::OneToOneTaken {
            model:    source.name.clone(),
            relation: relation.name.clone(),
          });
        }
      }
    }
    Ok(())
  }

  /// The stored copy of `key`, deleted or not.
  async fn stored(&self, key: &RecordKey) -> Result<Record> {
    let query = Query::new(key.model.clone()).filter(Filter::new().pk(key.pk), Some(true));
    let mut rows = self.store().select(&query).await.map_err(Error::store)?;
    match rows.pop() {
      Some(row) => Ok(row),
      None => Err(Error::DoesNotExist { model: key.model.clone() }),
    }
  }

  /// Link `right` to `left` through the many-to-many `relation` of `left`'s
  /// model.
  pub async fn link(&self, left: &Record, relation: &str, right: &Record) -> Result<()> {
    let through = self.join_table(left, relation, right)?;
    self
      .store()
      .link(through, left.pk, right.pk)
      .await
      .map_err(Error::store)
  }

  pub async fn unlink(&self, left: &Record, relation: &str, right: &Record) -> Result<()> {
    let through = self.join_table(left, relation, right)?;
    self
      .store()
      .unlink(through, left.pk, right.pk)
      .await
      .map_err(Error::store)
  }

  fn join_table(&self, left: &Record, relation: &str, right: &Record) -> Result<&str> {
    let def = self.schema().model(&left.model)?.relation_def(relation)?;
    let RelationKind::ManyToMany { through } = &def.kind else {
      return Err(Error::NotManyToMany {
        model:    left.model.clone(),
        relation: relation.to_owned(),
      });
    };
    if def.target != right.model {
      return Err(Error::InvalidRelation {
        model:    left.model.clone(),
        relation: relation.to_owned(),
        reason:   format!("expects {}, got {}", def.target, right.model),
      });
    }
    Ok(through)
  }

  // ── Soft-delete state ─────────────────────────────────────────────────

  /// Soft-delete `record` and cascade to its paranoid relations.
  ///
  /// Deleting a row that is already deleted leaves its timestamp alone but
  /// still cascades, so every descendant ends up deleted. Returns the number
  /// of rows covered by the cascade, `record` included. Fails with
  /// [`Error::DoesNotExist`] if the row was never stored.
  pub async fn delete(&self, record: &mut Record) -> Result<usize> {
    let rows = self.transition_one(record, Operation::Delete).await?;
    info!(key = %record.key(), rows, "record soft-deleted");
    Ok(rows)
  }

  /// Restore `record` and cascade to its paranoid relations.
  pub async fn restore(&self, record: &mut Record) -> Result<usize> {
    let rows = self.transition_one(record, Operation::Restore).await?;
    info!(key = %record.key(), rows, "record restored");
    Ok(rows)
  }

  /// Transition a single stored row, then copy the stored deletion state back
  /// onto `record` so a stale copy picks up the timestamp the store kept.
  async fn transition_one(&self, record: &mut Record, operation: Operation) -> Result<usize> {
    let key = record.key();
    self.schema().model(&key.model)?;
    self.stored(&key).await?;

    let rows = self.transition(vec![key.clone()], operation).await?;
    let stored = self.stored(&key).await?;
    record.sync_deletion(&stored);
    Ok(rows)
  }

  /// Plan the cascade from `roots` and apply it as one transition.
  pub(crate) async fn transition(
    &self,
    roots: Vec<RecordKey>,
    operation: Operation,
  ) -> Result<usize> {
    for root in &roots {
      if !self.schema().model(&root.model)?.paranoid {
        return Err(Error::NotParanoid(root.model.clone()));
      }
    }

    let keys = cascade::collect(self.store(), self.schema(), roots, operation).await?;
    let transition = Transition { operation, at: Utc::now(), keys };
    self.store().apply(&transition).await.map_err(Error::store)
  }
}

// ─── QuerySet ────────────────────────────────────────────────────────────────

/// A lazily evaluated, chainable collection of rows.
///
/// Nothing is cached: `count`, `fetch` and the lookups query the store each
/// time, so a queryset built before a delete sees the delete afterwards.
pub struct QuerySet<S> {
  pub(crate) manager: Manager<S>,
  pub(crate) query:   Query,
}

impl<S> Clone for QuerySet<S> {
  fn clone(&self) -> Self {
    Self { manager: self.manager.clone(), query: self.query.clone() }
  }
}

impl<S: RecordStore> QuerySet<S> {
  pub fn query(&self) -> &Query { &self.query }

  pub fn model(&self) -> &str { &self.query.model }

  fn chain(&self, query: Query) -> Self {
    Self { manager: self.manager.clone(), query }
  }

  /// Same predicates; deleted rows included when `with_deleted` is true and
  /// excluded otherwise.
  pub fn all(&self, with_deleted: bool) -> Self { self.chain(self.query.all(with_deleted)) }

  /// AND `filter` into the predicates. See [`Query::filter`] for how
  /// `with_deleted` interacts with earlier links.
  pub fn filter(&self, filter: Filter, with_deleted: Option<bool>) -> Self {
    self.chain(self.query.filter(filter, with_deleted))
  }

  /// Only soft-deleted rows.
  pub fn deleted_only(&self) -> Self { self.chain(self.query.deleted_only()) }

  // ── Evaluation ────────────────────────────────────────────────────────

  pub async fn fetch(&self) -> Result<Vec<Record>> {
    let schema = self.manager.schema();
    self.query.validate(schema)?;
    let model = schema.model(&self.query.model)?;

    let mut rows = self
      .manager
      .store()
      .select(&self.query)
      .await
      .map_err(Error::store)?;
    for row in &mut rows {
      model.conform(&mut row.fields);
    }
    Ok(rows)
  }

  pub async fn count(&self) -> Result<u64> {
    self.query.validate(self.manager.schema())?;
    self.manager.store().count(&self.query).await.map_err(Error::store)
  }

  pub async fn exists(&self) -> Result<bool> { Ok(self.count().await? > 0) }

  /// Soft-delete every visible row, each with its cascade, in one transition.
  pub async fn delete(&self) -> Result<usize> {
    self.bulk(Operation::Delete).await
  }

  /// Restore every visible row, each with its cascade, in one transition.
  pub async fn restore(&self) -> Result<usize> {
    self.bulk(Operation::Restore).await
  }

  async fn bulk(&self, operation: Operation) -> Result<usize> {
    let roots: Vec<RecordKey> = self.fetch().await?.iter().map(Record::key).collect();
    if roots.is_empty() {
      return Ok(0);
    }

    let matched = roots.len();
    let rows = self.manager.transition(roots, operation).await?;
    info!(
      model = %self.query.model,
      %operation,
      matched,
      rows,
      "queryset transitioned"
    );
    Ok(rows)
  }
}
