//! Encoding and decoding between engine types and SQLite columns, and the
//! translation of [`Query`] descriptors into `WHERE` clauses.
//!
//! Timestamps are stored as RFC 3339 strings with nanoseconds, UUIDs as hyphenated lowercase
//! strings, field maps as compact JSON objects.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use paranoid_core::{
  Record, Value,
  query::{Condition, Query, Visibility},
};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Fixed-width so that string order in SQLite matches time order.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Fields ───────────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &BTreeMap<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(s: &str) -> Result<BTreeMap<String, Value>> {
  Ok(serde_json::from_str(s)?)
}

/// Bind form of a field value, comparable with `json_extract` output.
pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Uuid(id) => SqlValue::Text(encode_uuid(*id)),
    Value::Text(s) => SqlValue::Text(s.clone()),
  }
}

// ─── Query → SQL ──────────────────────────────────────────────────────────────

/// A `WHERE` clause with positional parameters, ready to splice into a
/// statement over the `records` table.
pub struct WhereClause {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

pub fn where_clause(query: &Query) -> WhereClause {
  let mut conds = vec!["model = ?".to_owned()];
  let mut params = vec![SqlValue::Text(query.model.clone())];

  for condition in query.filter.conditions() {
    match condition {
      Condition::Field { field, value: Value::Null } => {
        conds.push("json_extract(fields, ?) IS NULL".into());
        params.push(SqlValue::Text(json_path(field)));
      }
      Condition::Field { field, value } => {
        conds.push("json_extract(fields, ?) = ?".into());
        params.push(SqlValue::Text(json_path(field)));
        params.push(encode_value(value));
      }
      Condition::Pk(pk) => {
        conds.push("pk = ?".into());
        params.push(SqlValue::Text(encode_uuid(*pk)));
      }
      Condition::Linked { through, left } => {
        conds.push(
          "pk IN (SELECT right_pk FROM links WHERE join_table = ? AND left_pk = ? \
           UNION SELECT left_pk FROM links WHERE join_table = ? AND right_pk = ?)"
            .into(),
        );
        for _ in 0..2 {
          params.push(SqlValue::Text(through.clone()));
          params.push(SqlValue::Text(encode_uuid(*left)));
        }
      }
    }
  }

  match query.visibility {
    Visibility::ExcludeDeleted => conds.push("is_soft_deleted = 0".into()),
    Visibility::DeletedOnly => conds.push("is_soft_deleted = 1".into()),
    Visibility::IncludeDeleted => {}
  }

  WhereClause { sql: conds.join(" AND "), params }
}

fn json_path(field: &str) -> String { format!("$.\"{field}\"") }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub pk:         String,
  pub model:      String,
  pub fields:     String,
  pub created_at: String,
  pub deleted_at: Option<String>,
}

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "pk, model, fields, created_at, deleted_at";

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pk:         row.get(0)?,
      model:      row.get(1)?,
      fields:     row.get(2)?,
      created_at: row.get(3)?,
      deleted_at: row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    let deleted_at = self.deleted_at.as_deref().map(decode_dt).transpose()?;
    Ok(Record::from_parts(
      decode_uuid(&self.pk)?,
      self.model,
      decode_fields(&self.fields)?,
      decode_dt(&self.created_at)?,
      deleted_at,
    ))
  }
}

#[cfg(test)]
mod tests {
  use paranoid_core::Filter;

  use super::*;

  #[test]
  fn default_query_hides_deleted_rows() {
    let clause = where_clause(&Query::new("phone"));
    assert_eq!(clause.sql, "model = ? AND is_soft_deleted = 0");
    assert_eq!(clause.params, vec![SqlValue::Text("phone".into())]);
  }

  #[test]
  fn include_deleted_adds_no_state_condition() {
    let clause = where_clause(&Query::new("phone").all(true));
    assert_eq!(clause.sql, "model = ?");
  }

  #[test]
  fn field_conditions_bind_path_and_value() {
    let owner = Uuid::new_v4();
    let query = Query::new("phone")
      .filter(Filter::new().eq("owner", owner).eq("primary", true), None)
      .deleted_only();
    let clause = where_clause(&query);

    assert_eq!(
      clause.sql,
      "model = ? AND json_extract(fields, ?) = ? AND json_extract(fields, ?) = ? \
       AND is_soft_deleted = 1"
    );
    assert_eq!(clause.params[1], SqlValue::Text("$.\"owner\"".into()));
    assert_eq!(clause.params[2], SqlValue::Text(owner.to_string()));
    assert_eq!(clause.params[4], SqlValue::Integer(1));
  }

  #[test]
  fn linked_matches_either_side_of_the_join_row() {
    let tag = Uuid::new_v4();
    let clause = where_clause(&Query::new("person").filter(Filter::new().linked("person_tags", tag), None));

    assert!(clause.sql.contains("left_pk = ? UNION SELECT left_pk"));
    assert!(clause.sql.contains("right_pk = ?)"));
    assert_eq!(clause.params.len(), 5);
    assert_eq!(clause.params[3], SqlValue::Text("person_tags".into()));
    assert_eq!(clause.params[4], SqlValue::Text(tag.to_string()));
  }

  #[test]
  fn timestamps_sort_as_strings() {
    let parse = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
    let earlier = parse("2024-01-01T00:00:01.123456789Z");
    let later = parse("2024-01-01T00:00:01.5Z");

    assert!(encode_dt(earlier) < encode_dt(later));
    assert_eq!(decode_dt(&encode_dt(earlier)).unwrap(), earlier);
  }

  #[test]
  fn null_compares_with_is_null() {
    let query = Query::new("phone").filter(Filter::new().eq("label", Value::Null), None);
    let clause = where_clause(&query);
    assert!(clause.sql.contains("json_extract(fields, ?) IS NULL"));
    assert_eq!(clause.params.len(), 2);
  }
}
