//! Field values stored on a [`Record`](crate::record::Record).
//!
//! Values serialise as plain JSON scalars. Strings always deserialise as
//! [`Value::Text`]; [`ModelDef::conform`] turns foreign-key fields back into
//! [`Value::Uuid`].
//!
//! [`ModelDef::conform`]: crate::schema::ModelDef::conform

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Bool(bool),
  Integer(i64),
  Text(String),
  Uuid(Uuid),
}

impl Value {
  /// Short name of the variant, used in type-mismatch errors.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Integer(_) => "integer",
      Value::Uuid(_) => "uuid",
      Value::Text(_) => "text",
    }
  }

  pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

  pub fn as_uuid(&self) -> Option<Uuid> {
    match self {
      Value::Uuid(id) => Some(*id),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Integer(i) => write!(f, "{i}"),
      Value::Uuid(id) => write!(f, "{id}"),
      Value::Text(s) => f.write_str(s),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self { Value::Integer(i.into()) }
}

impl From<Uuid> for Value {
  fn from(id: Uuid) -> Self { Value::Uuid(id) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Value::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Value::Text(s) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Value::Null, Into::into) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn serialises_as_plain_scalars() {
    let id = Uuid::new_v4();
    let json = serde_json::to_string(&vec![
      Value::Null,
      Value::Bool(true),
      Value::Integer(7),
      Value::Uuid(id),
      Value::Text("555-0100".into()),
    ])
    .unwrap();
    assert_eq!(json, format!(r#"[null,true,7,"{id}","555-0100"]"#));
  }

  #[test]
  fn strings_deserialise_as_text() {
    let id = Uuid::new_v4();
    let v: Value = serde_json::from_str(&format!("\"{id}\"")).unwrap();
    assert_eq!(v, Value::Text(id.to_string()));

    let v: Value = serde_json::from_str("7").unwrap();
    assert_eq!(v, Value::Integer(7));
  }

  #[test]
  fn option_maps_none_to_null() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
  }
}
