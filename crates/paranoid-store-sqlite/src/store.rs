//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::{path::Path, time::Duration};

use paranoid_core::{
  Operation, Record, RecordStore, Transition,
  query::Query,
};
use uuid::Uuid;

use crate::{
  Error, Result, StoreConfig,
  encode::{
    RECORD_COLUMNS, RawRecord, encode_dt, encode_fields, encode_uuid, where_clause,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open the store described by `config`.
  pub async fn open_with(config: &StoreConfig) -> Result<Self> {
    let store = if config.is_in_memory() {
      Self::open_in_memory().await?
    } else {
      Self::open(&config.path).await?
    };

    let timeout = Duration::from_millis(config.busy_timeout_ms);
    store
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }

  /// Write `record`'s fields, returning the number of rows changed (0 or 1).
  /// Deletion state is only changed by [`RecordStore::apply`].
  async fn write_fields(&self, record: &Record) -> Result<usize> {
    let pk_str     = encode_uuid(record.pk);
    let fields_str = encode_fields(&record.fields)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE records SET fields = ?1 WHERE pk = ?2",
          rusqlite::params![fields_str, pk_str],
        )?)
      })
      .await?;
    Ok(changed)
  }

  /// Run raw SQL against the connection.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  async fn insert(&self, record: &Record) -> Result<()> {
    let pk_str         = encode_uuid(record.pk);
    let model          = record.model.clone();
    let fields_str     = encode_fields(&record.fields)?;
    let created_at_str = encode_dt(record.created_at);
    let deleted        = record.is_soft_deleted();
    let deleted_at_str = record.deleted_at().map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO records (pk, model, fields, created_at, is_soft_deleted, deleted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            pk_str,
            model,
            fields_str,
            created_at_str,
            deleted,
            deleted_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn save(&self, record: &Record) -> Result<()> {
    match self.write_fields(record).await? {
      0 => Err(Error::RecordNotFound(record.pk)),
      _ => Ok(()),
    }
  }

  async fn select(&self, query: &Query) -> Result<Vec<Record>> {
    let clause = where_clause(query);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RECORD_COLUMNS} FROM records
           WHERE {}
           ORDER BY created_at, rowid",
          clause.sql
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(clause.params.iter()),
            RawRecord::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn count(&self, query: &Query) -> Result<u64> {
    let clause = where_clause(query);

    let count: i64 = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT COUNT(*) FROM records WHERE {}", clause.sql);
        Ok(conn.query_row(
          &sql,
          rusqlite::params_from_iter(clause.params.iter()),
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn link(&self, through: &str, left: Uuid, right: Uuid) -> Result<()> {
    let through   = through.to_owned();
    let left_str  = encode_uuid(left);
    let right_str = encode_uuid(right);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO links (join_table, left_pk, right_pk)
           SELECT ?1, ?2, ?3
            WHERE NOT EXISTS (
              SELECT 1 FROM links WHERE join_table = ?1 AND left_pk = ?3 AND right_pk = ?2
            )",
          rusqlite::params![through, left_str, right_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn unlink(&self, through: &str, left: Uuid, right: Uuid) -> Result<()> {
    let through   = through.to_owned();
    let left_str  = encode_uuid(left);
    let right_str = encode_uuid(right);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM links
            WHERE join_table = ?1
              AND ((left_pk = ?2 AND right_pk = ?3) OR (left_pk = ?3 AND right_pk = ?2))",
          rusqlite::params![through, left_str, right_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn apply(&self, transition: &Transition) -> Result<usize> {
    let operation = transition.operation;
    let at_str    = encode_dt(transition.at);
    let keys: Vec<(String, String)> = transition
      .keys
      .iter()
      .map(|k| (encode_uuid(k.pk), k.model.clone()))
      .collect();

    let rows = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut rows = 0;
        {
          let mut stmt = match operation {
            Operation::Delete => tx.prepare(
              "UPDATE records
                 SET is_soft_deleted = 1, deleted_at = COALESCE(deleted_at, ?3)
               WHERE pk = ?1 AND model = ?2",
            )?,
            Operation::Restore => tx.prepare(
              "UPDATE records
                 SET is_soft_deleted = 0, deleted_at = NULL
               WHERE pk = ?1 AND model = ?2",
            )?,
          };
          for (pk, model) in &keys {
            rows += match operation {
              Operation::Delete => stmt.execute(rusqlite::params![pk, model, at_str])?,
              Operation::Restore => stmt.execute(rusqlite::params![pk, model])?,
            };
          }
        }
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    tracing::trace!(%operation, rows, "transition applied");
    Ok(rows)
  }
}
