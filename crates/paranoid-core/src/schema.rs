//! Model definitions and the relationship-descriptor table.
//!
//! A [`Schema`] is the mapping layer handed to the engine: which models exist,
//! which fields they carry, whether they support soft delete, and how they
//! relate. The cascade engine consults the relation table directly instead of
//! inspecting models at runtime.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  query::{Filter, Query},
  value::Value,
};

/// Names that belong to the record envelope and cannot be declared as fields.
pub const RESERVED_FIELDS: &[&str] =
  &["id", "created_at", "is_soft_deleted", "deleted_at"];

// ─── Fields ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
  Text,
  Integer,
  Boolean,
  /// Holds the primary key of a row of `model`.
  ForeignKey { model: String },
}

impl FieldKind {
  /// Whether a non-null `value` fits this kind.
  pub fn accepts(&self, value: &Value) -> bool {
    matches!(
      (self, value),
      (FieldKind::Text, Value::Text(_))
        | (FieldKind::Integer, Value::Integer(_))
        | (FieldKind::Boolean, Value::Bool(_))
        | (FieldKind::ForeignKey { .. }, Value::Uuid(_))
    )
  }

  /// Parse user input (e.g. a `--where field=value` argument) into a value of
  /// this kind.
  pub fn parse(&self, input: &str) -> Result<Value> {
    let parse_err = || Error::Parse {
      input:    input.to_owned(),
      expected: self.to_string(),
    };

    match self {
      FieldKind::Text => Ok(Value::Text(input.to_owned())),
      FieldKind::Integer => {
        input.parse().map(Value::Integer).map_err(|_| parse_err())
      }
      FieldKind::Boolean => match input {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(parse_err()),
      },
      FieldKind::ForeignKey { .. } => {
        Uuid::parse_str(input).map(Value::Uuid).map_err(|_| parse_err())
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
  pub name:     String,
  #[serde(flatten)]
  pub kind:     FieldKind,
  #[serde(default)]
  pub nullable: bool,
}

impl FieldDef {
  pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
    Self { name: name.into(), kind, nullable: false }
  }

  pub fn text(name: impl Into<String>) -> Self { Self::new(name, FieldKind::Text) }

  pub fn integer(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Integer)
  }

  pub fn boolean(name: impl Into<String>) -> Self {
    Self::new(name, FieldKind::Boolean)
  }

  pub fn foreign_key(name: impl Into<String>, model: impl Into<String>) -> Self {
    Self::new(name, FieldKind::ForeignKey { model: model.into() })
  }

  pub fn nullable(mut self) -> Self {
    self.nullable = true;
    self
  }
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// How the rows of a relation's target are found from a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationKind {
  /// One-to-many: target rows whose foreign key `field` holds the source pk.
  HasMany { field: String },
  /// One-to-one: like `HasMany`, with at most one target row.
  HasOne { field: String },
  /// Target rows linked to the source through the join table `through`.
  ManyToMany { through: String },
}

/// A relation declared on a source model, e.g. `person.phones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
  /// Accessor name, unique within the source model.
  pub name:   String,
  pub target: String,
  #[serde(flatten)]
  pub kind:   RelationKind,
}

impl RelationDef {
  /// All rows of the target model related to the source row `source`, with
  /// the default visibility.
  pub fn scope(&self, source: Uuid) -> Query {
    let filter = match &self.kind {
      RelationKind::HasMany { field } | RelationKind::HasOne { field } => {
        Filter::new().eq(field.clone(), source)
      }
      RelationKind::ManyToMany { through } => Filter::new().linked(through.clone(), source),
    };
    Query::new(self.target.clone()).filter(filter, None)
  }
}

// ─── Models ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDef {
  pub name:      String,
  /// Whether rows of this model are soft-deleted and take part in cascades.
  pub paranoid:  bool,
  #[serde(default)]
  pub fields:    Vec<FieldDef>,
  #[serde(default)]
  pub relations: Vec<RelationDef>,
}

impl ModelDef {
  /// A model whose rows are soft-deleted.
  pub fn paranoid(name: impl Into<String>) -> Self {
    Self {
      name:      name.into(),
      paranoid:  true,
      fields:    vec![],
      relations: vec![],
    }
  }

  /// A model that ignores soft delete; cascades never touch it.
  pub fn plain(name: impl Into<String>) -> Self {
    Self { paranoid: false, ..Self::paranoid(name) }
  }

  pub fn field(mut self, field: FieldDef) -> Self {
    self.fields.push(field);
    self
  }

  pub fn has_many(
    self,
    name: impl Into<String>,
    target: impl Into<String>,
    field: impl Into<String>,
  ) -> Self {
    self.relation(name, target, RelationKind::HasMany { field: field.into() })
  }

  pub fn has_one(
    self,
    name: impl Into<String>,
    target: impl Into<String>,
    field: impl Into<String>,
  ) -> Self {
    self.relation(name, target, RelationKind::HasOne { field: field.into() })
  }

  pub fn many_to_many(
    self,
    name: impl Into<String>,
    target: impl Into<String>,
    through: impl Into<String>,
  ) -> Self {
    self.relation(name, target, RelationKind::ManyToMany {
      through: through.into(),
    })
  }

  fn relation(
    mut self,
    name: impl Into<String>,
    target: impl Into<String>,
    kind: RelationKind,
  ) -> Self {
    self.relations.push(RelationDef {
      name: name.into(),
      target: target.into(),
      kind,
    });
    self
  }

  pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn relation_def(&self, name: &str) -> Result<&RelationDef> {
    self
      .relations
      .iter()
      .find(|r| r.name == name)
      .ok_or_else(|| Error::UnknownRelation {
        model:    self.name.clone(),
        relation: name.to_owned(),
      })
  }

  /// Check that `value` may be compared against or stored in `field`.
  pub fn check_value(&self, field: &str, value: &Value) -> Result<&FieldDef> {
    let def = self.field_def(field).ok_or_else(|| Error::UnknownField {
      model: self.name.clone(),
      field: field.to_owned(),
    })?;

    let fits = if value.is_null() {
      def.nullable
    } else {
      def.kind.accepts(value)
    };

    if !fits {
      return Err(Error::TypeMismatch {
        model:    self.name.clone(),
        field:    field.to_owned(),
        expected: def.kind.to_string(),
        found:    value.type_name().to_owned(),
      });
    }
    Ok(def)
  }

  /// Validate a full field map for a new or saved row. Missing nullable fields
  /// are filled with [`Value::Null`].
  pub fn validate_fields(&self, fields: &mut BTreeMap<String, Value>) -> Result<()> {
    for (name, value) in fields.iter() {
      self.check_value(name, value)?;
    }

    for def in &self.fields {
      if fields.contains_key(&def.name) {
        continue;
      }
      if !def.nullable {
        return Err(Error::MissingField {
          model: self.name.clone(),
          field: def.name.clone(),
        });
      }
      fields.insert(def.name.clone(), Value::Null);
    }
    Ok(())
  }

  /// Undo the JSON ambiguity between UUIDs and text: storage hands back
  /// foreign keys as `Value::Text`.
  pub fn conform(&self, fields: &mut BTreeMap<String, Value>) {
    for (name, value) in fields.iter_mut() {
      let is_foreign_key = matches!(
        self.field_def(name),
        Some(FieldDef { kind: FieldKind::ForeignKey { .. }, .. })
      );
      if !is_foreign_key {
        continue;
      }
      if let Some(id) = value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
        *value = Value::Uuid(id);
      }
    }
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// A validated set of models.
#[derive(Debug, Clone, Default)]
pub struct Schema {
  models: BTreeMap<String, ModelDef>,
}

impl Schema {
  /// Build and validate a schema.
  ///
  /// Fails on duplicate or reserved names, dangling foreign keys, and
  /// relations whose join field does not point back at the source model.
  pub fn new(models: impl IntoIterator<Item = ModelDef>) -> Result<Self> {
    let mut map = BTreeMap::new();
    for model in models {
      if map.contains_key(&model.name) {
        return Err(Error::DuplicateModel(model.name));
      }
      map.insert(model.name.clone(), model);
    }

    let schema = Self { models: map };
    for model in schema.models.values() {
      schema.validate_model(model)?;
    }
    Ok(schema)
  }

  pub fn model(&self, name: &str) -> Result<&ModelDef> {
    self
      .models
      .get(name)
      .ok_or_else(|| Error::UnknownModel(name.to_owned()))
  }

  pub fn models(&self) -> impl Iterator<Item = &ModelDef> { self.models.values() }

  fn validate_model(&self, model: &ModelDef) -> Result<()> {
    let mut seen = HashSet::new();
    for field in &model.fields {
      if RESERVED_FIELDS.contains(&field.name.as_str()) {
        return Err(Error::ReservedField(field.name.clone()));
      }
      if !seen.insert(field.name.as_str()) {
        return Err(Error::DuplicateField {
          model: model.name.clone(),
          field: field.name.clone(),
        });
      }
      if let FieldKind::ForeignKey { model: referenced } = &field.kind {
        self.model(referenced)?;
      }
    }

    let mut seen = HashSet::new();
    for relation in &model.relations {
      let invalid = |reason: String| Error::InvalidRelation {
        model:    model.name.clone(),
        relation: relation.name.clone(),
        reason,
      };

      if !seen.insert(relation.name.as_str()) {
        return Err(invalid("relation name declared more than once".into()));
      }

      let target = self
        .models
        .get(&relation.target)
        .ok_or_else(|| invalid(format!("unknown target model {:?}", relation.target)))?;

      match &relation.kind {
        RelationKind::HasMany { field } | RelationKind::HasOne { field } => {
          match target.field_def(field).map(|f| &f.kind) {
            Some(FieldKind::ForeignKey { model: referenced })
              if *referenced == model.name => {}
            _ => {
              return Err(invalid(format!(
                "{}.{field} is not a foreign key to {}",
                target.name, model.name
              )));
            }
          }
        }
        RelationKind::ManyToMany { through } => {
          if through.is_empty() {
            return Err(invalid("join table name is empty".into()));
          }
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn person_and_phone() -> Vec<ModelDef> {
    vec![
      ModelDef::paranoid("person")
        .field(FieldDef::text("name"))
        .has_many("phones", "phone", "owner"),
      ModelDef::paranoid("phone")
        .field(FieldDef::text("number"))
        .field(FieldDef::foreign_key("owner", "person")),
    ]
  }

  #[test]
  fn builds_valid_schema() {
    let schema = Schema::new(person_and_phone()).unwrap();
    assert!(schema.model("person").unwrap().paranoid);
    assert!(schema.model("person").unwrap().relation_def("phones").is_ok());
    assert!(matches!(schema.model("car"), Err(Error::UnknownModel(_))));
  }

  #[test]
  fn rejects_duplicate_model() {
    let mut models = person_and_phone();
    models.push(ModelDef::plain("phone"));
    assert!(matches!(Schema::new(models), Err(Error::DuplicateModel(m)) if m == "phone"));
  }

  #[test]
  fn rejects_reserved_field() {
    let models = vec![ModelDef::paranoid("person").field(FieldDef::text("deleted_at"))];
    assert!(matches!(Schema::new(models), Err(Error::ReservedField(_))));
  }

  #[test]
  fn rejects_relation_without_back_reference() {
    let models = vec![
      ModelDef::paranoid("person").has_many("phones", "phone", "number"),
      ModelDef::paranoid("phone").field(FieldDef::text("number")),
    ];
    assert!(matches!(Schema::new(models), Err(Error::InvalidRelation { .. })));
  }

  #[test]
  fn rejects_unknown_relation_target() {
    let models = vec![ModelDef::paranoid("person").many_to_many("clothes", "clothes", "wardrobe")];
    assert!(matches!(Schema::new(models), Err(Error::InvalidRelation { .. })));
  }

  #[test]
  fn validate_fields_fills_nullable_and_rejects_missing() {
    let model = ModelDef::paranoid("phone")
      .field(FieldDef::text("number"))
      .field(FieldDef::text("label").nullable());

    let mut fields = BTreeMap::from([("number".to_owned(), Value::from("555"))]);
    model.validate_fields(&mut fields).unwrap();
    assert_eq!(fields["label"], Value::Null);

    let mut fields = BTreeMap::new();
    assert!(matches!(
      model.validate_fields(&mut fields),
      Err(Error::MissingField { field, .. }) if field == "number"
    ));
  }

  #[test]
  fn check_value_reports_type_mismatch() {
    let model = ModelDef::paranoid("phone").field(FieldDef::integer("rank"));
    let err = model.check_value("rank", &Value::from("first")).unwrap_err();
    assert!(matches!(
      err,
      Error::TypeMismatch { ref expected, ref found, .. } if expected == "integer" && found == "text"
    ));
    assert!(matches!(
      model.check_value("colour", &Value::Null),
      Err(Error::UnknownField { .. })
    ));
  }

  #[test]
  fn conform_turns_foreign_keys_back_into_uuids() {
    let model = ModelDef::paranoid("phone")
      .field(FieldDef::text("number"))
      .field(FieldDef::foreign_key("owner", "person"));
    let id = Uuid::new_v4();
    let mut fields = BTreeMap::from([
      ("number".to_owned(), Value::Text(id.simple().to_string())),
      ("owner".to_owned(), Value::Text(id.to_string())),
    ]);
    model.conform(&mut fields);
    assert_eq!(fields["number"], Value::Text(id.simple().to_string()));
    assert_eq!(fields["owner"], Value::Uuid(id));
  }

  #[test]
  fn field_kind_parses_user_input() {
    assert_eq!(FieldKind::Integer.parse("42").unwrap(), Value::Integer(42));
    assert_eq!(FieldKind::Boolean.parse("false").unwrap(), Value::Bool(false));
    assert!(matches!(FieldKind::Integer.parse("x"), Err(Error::Parse { .. })));

    let id = Uuid::new_v4();
    let fk = FieldKind::ForeignKey { model: "person".into() };
    assert_eq!(fk.parse(&id.to_string()).unwrap(), Value::Uuid(id));
    assert_eq!(fk.to_string(), "foreign_key");
  }

  #[test]
  fn model_def_deserialises_from_json() {
    let model: ModelDef = serde_json::from_value(serde_json::json!({
      "name": "phone",
      "paranoid": true,
      "fields": [
        { "name": "number", "kind": "text" },
        { "name": "owner", "kind": "foreign_key", "model": "person", "nullable": true }
      ],
      "relations": [
        { "name": "tags", "target": "tag", "kind": "many_to_many", "through": "phone_tags" }
      ]
    }))
    .unwrap();

    assert_eq!(model.fields[1], FieldDef::foreign_key("owner", "person").nullable());
    assert_eq!(model.relations[0].kind, RelationKind::ManyToMany {
      through: "phone_tags".into(),
    });
  }
}
