//! Model definitions — user-authored schemas describing one data type.
//!
//! A model owns a map of named fields plus optional relationship, index, and
//! embedding configuration. Records (see [`crate::record`]) are validated
//! against their model before every write.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Field types ─────────────────────────────────────────────────────────────

/// The tagged union of value types a field may declare.
///
/// `Vector` is system-reserved for embedding storage and cannot appear in a
/// user-authored model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
  String,
  Number,
  Boolean,
  Date,
  Vector,
}

impl FieldType {
  pub fn as_str(self) -> &'static str {
    match self {
      FieldType::String => "string",
      FieldType::Number => "number",
      FieldType::Boolean => "boolean",
      FieldType::Date => "date",
      FieldType::Vector => "vector",
    }
  }

  /// Whether users may declare a field of this type themselves.
  pub fn user_creatable(self) -> bool {
    !matches!(self, FieldType::Vector)
  }
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Field definition ────────────────────────────────────────────────────────

/// Reference to a field of another model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyReference {
  pub references: ForeignKeyTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
  pub model_id: Uuid,
  pub field_id: String,
}

/// One declared field of a model.
///
/// `unique` is persisted but not enforced by the record store — a known gap
/// carried over deliberately, not an oversight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
  pub id: Uuid,
  #[serde(rename = "type")]
  pub field_type: FieldType,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub unique: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
  /// Allowed values; membership is checked by the validator when present.
  #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
  pub enum_values: Option<Vec<Value>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub foreign_key: Option<ForeignKeyReference>,
}

// ─── Relationships / indexes / embedding ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferentialAction {
  Cascade,
  SetNull,
  Restrict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipKey {
  /// Name of the declared field holding the foreign id.
  pub field_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
  pub id: Uuid,
  pub target_model_id: Uuid,
  pub foreign_key: RelationshipKey,
  #[serde(default, rename = "onDelete", skip_serializing_if = "Option::is_none")]
  pub on_delete: Option<ReferentialAction>,
  #[serde(default, rename = "onUpdate", skip_serializing_if = "Option::is_none")]
  pub on_update: Option<ReferentialAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
  pub fields: Vec<String>,
  #[serde(default)]
  pub unique: bool,
}

/// Per-model embedding configuration. `source_fields` order is significant:
/// it is the concatenation order for the embedded text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
  pub enabled: bool,
  pub source_fields: Vec<String>,
}

// ─── Model definition ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
  Active,
  Archived,
}

/// A user-authored schema. Owned by exactly one user; name unique per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
  pub id: Uuid,
  pub owner_id: Uuid,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub fields: BTreeMap<String, FieldDefinition>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub relationships: Option<BTreeMap<String, RelationshipDefinition>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub indexes: Option<BTreeMap<String, IndexDefinition>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub embedding: Option<EmbeddingConfig>,
  pub status: ModelStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ModelDefinition {
  pub fn embedding_enabled(&self) -> bool {
    self.embedding.as_ref().is_some_and(|e| e.enabled)
  }
}

/// Input for creating a model; id, owner, status, and timestamps are assigned
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModel {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub fields: BTreeMap<String, FieldDefinition>,
  #[serde(default)]
  pub relationships: Option<BTreeMap<String, RelationshipDefinition>>,
  #[serde(default)]
  pub indexes: Option<BTreeMap<String, IndexDefinition>>,
  #[serde(default)]
  pub embedding: Option<EmbeddingConfig>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelPatch {
  pub name: Option<String>,
  pub description: Option<String>,
  pub fields: Option<BTreeMap<String, FieldDefinition>>,
  pub relationships: Option<BTreeMap<String, RelationshipDefinition>>,
  pub indexes: Option<BTreeMap<String, IndexDefinition>>,
  pub embedding: Option<EmbeddingConfig>,
}

/// `true` iff `name` is non-empty and contains only letters, digits, and
/// hyphens.
pub fn valid_model_name(name: &str) -> bool {
  !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

impl NewModel {
  /// Model-level validation: name charset, reserved field types,
  /// relationship targets, and embedding source fields.
  pub fn validate(&self) -> Result<()> {
    if !valid_model_name(&self.name) {
      return Err(Error::InvalidModelName(self.name.clone()));
    }

    for (name, field) in &self.fields {
      if !field.field_type.user_creatable() {
        return Err(Error::ReservedFieldType {
          field:      name.clone(),
          field_type: field.field_type,
        });
      }
    }

    if let Some(relationships) = &self.relationships {
      for (rel_name, rel) in relationships {
        if !self.fields.contains_key(&rel.foreign_key.field_id) {
          return Err(Error::InvalidRelationship {
            relationship: rel_name.clone(),
            field:        rel.foreign_key.field_id.clone(),
          });
        }
      }
    }

    if let Some(embedding) = &self.embedding
      && embedding.enabled
    {
      if embedding.source_fields.is_empty() {
        return Err(Error::NoEmbeddingSources);
      }
      for source in &embedding.source_fields {
        match self.fields.get(source) {
          Some(f) if f.field_type == FieldType::String => {}
          _ => {
            return Err(Error::InvalidEmbeddingSource { field: source.clone() });
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

  fn string_field() -> FieldDefinition {
    FieldDefinition {
      id:          Uuid::new_v4(),
      field_type:  FieldType::String,
      required:    false,
      unique:      false,
      default:     None,
      enum_values: None,
      description: None,
      foreign_key: None,
    }
  }

  fn new_model(name: &str) -> NewModel {
    NewModel {
      name:          name.to_string(),
      description:   None,
      fields:        BTreeMap::from([("title".to_string(), string_field())]),
      relationships: None,
      indexes:       None,
      embedding:     None,
    }
  }

  #[test]
  fn accepts_alphanumeric_and_hyphen_names() {
    assert!(new_model("my-model-2").validate().is_ok());
  }

  #[test]
  fn rejects_empty_and_punctuated_names() {
    assert!(matches!(
      new_model("").validate(),
      Err(Error::InvalidModelName(_))
    ));
    assert!(matches!(
      new_model("my model").validate(),
      Err(Error::InvalidModelName(_))
    ));
    assert!(matches!(
      new_model("my_model").validate(),
      Err(Error::InvalidModelName(_))
    ));
  }

  #[test]
  fn rejects_user_declared_vector_fields() {
    let mut model = new_model("vectors");
    model.fields.insert("embedding".to_string(), FieldDefinition {
      field_type: FieldType::Vector,
      ..string_field()
    });
    assert!(matches!(
      model.validate(),
      Err(Error::ReservedFieldType { .. })
    ));
  }

  #[test]
  fn rejects_embedding_over_missing_or_nonstring_fields() {
    let mut model = new_model("articles");
    model.embedding = Some(EmbeddingConfig {
      enabled:       true,
      source_fields: vec!["body".to_string()],
    });
    assert!(matches!(
      model.validate(),
      Err(Error::InvalidEmbeddingSource { .. })
    ));

    model.fields.insert("body".to_string(), FieldDefinition {
      field_type: FieldType::Number,
      ..string_field()
    });
    assert!(matches!(
      model.validate(),
      Err(Error::InvalidEmbeddingSource { .. })
    ));
  }

  #[test]
  fn rejects_embedding_with_no_sources() {
    let mut model = new_model("articles");
    model.embedding = Some(EmbeddingConfig {
      enabled:       true,
      source_fields: vec![],
    });
    assert!(matches!(model.validate(), Err(Error::NoEmbeddingSources)));
  }

  #[test]
  fn disabled_embedding_is_not_checked() {
    let mut model = new_model("articles");
    model.embedding = Some(EmbeddingConfig {
      enabled:       false,
      source_fields: vec!["nope".to_string()],
    });
    assert!(model.validate().is_ok());
  }

  #[test]
  fn rejects_relationship_over_undeclared_field() {
    let mut model = new_model("orders");
    model.relationships = Some(BTreeMap::from([("customer".to_string(),
      RelationshipDefinition {
        id:              Uuid::new_v4(),
        target_model_id: Uuid::new_v4(),
        foreign_key:     RelationshipKey { field_id: "customer_id".to_string() },
        on_delete:       None,
        on_update:       None,
      })]));
    assert!(matches!(
      model.validate(),
      Err(Error::InvalidRelationship { .. })
    ));
  }
}
