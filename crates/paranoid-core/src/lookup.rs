//! Single-row lookups: `get`, `get_deleted` and `get_or_restore`.
//!
//! Each lookup ANDs its filter into the queryset's predicates and evaluates
//! with deleted rows included, then decides from the deletion state of the
//! matches. The queryset's own visibility does not apply here.

use crate::{
  Error, Result,
  manager::QuerySet,
  query::Filter,
  record::Record,
  store::RecordStore,
};

impl<S: RecordStore> QuerySet<S> {
  /// The single non-deleted row matching `filter`.
  ///
  /// - [`Error::SoftDeleted`] when only deleted rows match,
  /// - [`Error::DoesNotExist`] when nothing matches,
  /// - [`Error::MultipleObjectsReturned`] when several non-deleted rows match.
  pub async fn get(&self, filter: Filter) -> Result<Record> {
    let rows = self.matching(filter).await?;
    resolve_get(&self.query.model, rows)
  }

  /// The single row matching `filter`, which must be soft-deleted.
  ///
  /// - [`Error::IsNotSoftDeleted`] when the match is not deleted,
  /// - [`Error::DoesNotExist`] when nothing matches,
  /// - [`Error::MultipleObjectsReturned`] when several rows match, deleted or
  ///   not.
  pub async fn get_deleted(&self, filter: Filter) -> Result<Record> {
    let rows = self.matching(filter).await?;
    resolve_get_deleted(&self.query.model, rows)
  }

  /// Like [`get`](Self::get), but a unique soft-deleted match is restored
  /// (with its cascade) and returned instead of failing.
  pub async fn get_or_restore(&self, filter: Filter) -> Result<Record> {
    let rows = self.matching(filter).await?;
    match resolve_get(&self.query.model, rows.clone()) {
      Err(Error::SoftDeleted { .. }) => {
        let mut record = resolve_get_deleted(&self.query.model, rows)?;
        self.manager.restore(&mut record).await?;
        Ok(record)
      }
      other => other,
    }
  }

  async fn matching(&self, filter: Filter) -> Result<Vec<Record>> {
    self.filter(filter, Some(true)).fetch().await
  }
}

fn resolve_get(model: &str, rows: Vec<Record>) -> Result<Record> {
  let any_deleted = rows.iter().any(Record::is_soft_deleted);
  let mut alive: Vec<Record> = rows.into_iter().filter(|r| !r.is_soft_deleted()).collect();

  match alive.len() {
    1 => Ok(alive.remove(0)),
    0 if any_deleted => Err(Error::SoftDeleted { model: model.to_owned() }),
    0 => Err(Error::DoesNotExist { model: model.to_owned() }),
    count => Err(Error::MultipleObjectsReturned { model: model.to_owned(), count }),
  }
}

fn resolve_get_deleted(model: &str, mut rows: Vec<Record>) -> Result<Record> {
  match rows.len() {
    0 => Err(Error::DoesNotExist { model: model.to_owned() }),
    1 if rows[0].is_soft_deleted() => Ok(rows.remove(0)),
    1 => Err(Error::IsNotSoftDeleted { model: model.to_owned() }),
    count => Err(Error::MultipleObjectsReturned { model: model.to_owned(), count }),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::record::NewRecord;

  fn phone(deleted: bool) -> Record {
    let mut r = Record::new(NewRecord::new("phone").set("number", "555"));
    if deleted {
      r.mark_deleted(Utc::now());
    }
    r
  }

  #[test]
  fn get_picks_the_single_live_row() {
    let live = phone(false);
    let got = resolve_get("phone", vec![phone(true), live.clone()]).unwrap();
    assert_eq!(got.pk, live.pk);
  }

  #[test]
  fn get_distinguishes_deleted_from_missing() {
    assert!(matches!(
      resolve_get("phone", vec![phone(true)]),
      Err(Error::SoftDeleted { .. })
    ));
    assert!(matches!(resolve_get("phone", vec![]), Err(Error::DoesNotExist { .. })));
  }

  #[test]
  fn get_rejects_ambiguous_live_rows() {
    assert!(matches!(
      resolve_get("phone", vec![phone(false), phone(false), phone(true)]),
      Err(Error::MultipleObjectsReturned { count: 2, .. })
    ));
  }

  #[test]
  fn get_deleted_requires_deleted_match() {
    assert!(resolve_get_deleted("phone", vec![phone(true)]).is_ok());
    assert!(matches!(
      resolve_get_deleted("phone", vec![phone(false)]),
      Err(Error::IsNotSoftDeleted { .. })
    ));
    assert!(matches!(
      resolve_get_deleted("phone", vec![]),
      Err(Error::DoesNotExist { .. })
    ));
  }

  #[test]
  fn get_deleted_counts_live_rows_as_ambiguous() {
    assert!(matches!(
      resolve_get_deleted("phone", vec![phone(true), phone(false)]),
      Err(Error::MultipleObjectsReturned { count: 2, .. })
    ));
  }
}
