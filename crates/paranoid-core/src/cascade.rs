//! Cascade planning for delete and restore.
//!
//! Starting from one or more root rows, walk every declared relation whose
//! target model is paranoid and collect the related rows, transitively. The
//! walk looks at deleted and non-deleted rows alike: a delete must reach
//! descendants of already-deleted rows, and a restore must find the deleted
//! rows it is undoing.
//!
//! Rows are collected first and written afterwards as one [`Transition`], so
//! the store can apply the whole cascade in a single transaction.
//!
//! [`Transition`]: crate::store::Transition

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::{
  Error, Result,
  query::Visibility,
  record::RecordKey,
  schema::Schema,
  store::{Operation, RecordStore},
};

/// Collect `roots` and every paranoid row reachable from them.
///
/// The result starts with the roots, lists each row once, and follows
/// breadth-first order. A row reached twice (a cycle in the relation graph,
/// or a diamond) is visited once.
pub async fn collect<S: RecordStore>(
  store: &S,
  schema: &Schema,
  roots: impl IntoIterator<Item = RecordKey>,
  operation: Operation,
) -> Result<Vec<RecordKey>> {
  let mut visited = HashSet::new();
  let mut queue = VecDeque::new();
  for root in roots {
    if visited.insert(root.clone()) {
      queue.push_back(root);
    }
  }

  let mut plan = Vec::new();
  while let Some(key) = queue.pop_front() {
    let model = schema.model(&key.model)?;

    for relation in &model.relations {
      let target = schema.model(&relation.target)?;
      if !target.paranoid {
        trace!(
          from = %key,
          relation = %relation.name,
          target = %target.name,
          "skipping non-paranoid relation"
        );
        continue;
      }

      let query = relation.scope(key.pk).with_visibility(Visibility::IncludeDeleted);
      let related = store.select(&query).await.map_err(Error::store)?;

      for record in related {
        let child = record.key();
        if visited.insert(child.clone()) {
          queue.push_back(child);
        } else {
          trace!(%child, "already visited");
        }
      }
    }

    plan.push(key);
  }

  debug!(%operation, rows = plan.len(), "cascade planned");
  Ok(plan)
}
