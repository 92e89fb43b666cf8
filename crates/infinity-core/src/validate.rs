//! The schema validator — pure conformance checking of a candidate field set
//! against a model definition.
//!
//! Keys not declared on the model pass through unvalidated. The schema is
//! additive, not strict; this looseness is intentional and gives producers
//! forward compatibility with models that grow fields over time.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::{
  Error, Result,
  model::{FieldType, ModelDefinition},
  record::FieldMap,
};

/// Check `fields` against `model`: required presence, declared types, and
/// enum membership. Pure; no side effects.
pub fn validate(model: &ModelDefinition, fields: &FieldMap) -> Result<()> {
  for (name, def) in &model.fields {
    if def.required && !fields.contains_key(name) {
      return Err(Error::MissingField { field: name.clone() });
    }

    let Some(value) = fields.get(name) else {
      continue;
    };

    check_type(name, def.field_type, value)?;

    if let Some(allowed) = &def.enum_values
      && !allowed.contains(value)
    {
      return Err(Error::EnumViolation {
        field:   name.clone(),
        allowed: allowed
          .iter()
          .map(Value::to_string)
          .collect::<Vec<_>>()
          .join(", "),
      });
    }
  }

  Ok(())
}

fn check_type(field: &str, expected: FieldType, value: &Value) -> Result<()> {
  let conforms = match expected {
    FieldType::String => value.is_string(),
    FieldType::Number => value.is_number(),
    FieldType::Boolean => value.is_boolean(),
    FieldType::Date => value.as_str().is_some_and(parseable_date),
    FieldType::Vector => value
      .as_array()
      .is_some_and(|xs| xs.iter().all(Value::is_number)),
  };

  if conforms {
    Ok(())
  } else {
    Err(Error::TypeMismatch { field: field.to_owned(), expected })
  }
}

/// Accept RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
fn parseable_date(s: &str) -> bool {
  DateTime::parse_from_rfc3339(s).is_ok()
    || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use chrono::Utc;
  use serde_json::{Map, json};
  use uuid::Uuid;

  use super::*;
  use crate::model::{FieldDefinition, ModelStatus};

  fn field(field_type: FieldType, required: bool) -> FieldDefinition {
    FieldDefinition {
      id: Uuid::new_v4(),
      field_type,
      required,
      unique: false,
      default: None,
      enum_values: None,
      description: None,
      foreign_key: None,
    }
  }

  fn model(fields: Vec<(&str, FieldDefinition)>) -> ModelDefinition {
    ModelDefinition {
      id:            Uuid::new_v4(),
      owner_id:      Uuid::new_v4(),
      name:          "test-model".to_string(),
      description:   None,
      fields:        fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<BTreeMap<_, _>>(),
      relationships: None,
      indexes:       None,
      embedding:     None,
      status:        ModelStatus::Active,
      created_at:    Utc::now(),
      updated_at:    Utc::now(),
    }
  }

  fn fields(value: Value) -> FieldMap {
    match value {
      Value::Object(map) => map,
      _ => Map::new(),
    }
  }

  #[test]
  fn missing_required_field_names_the_field() {
    let m = model(vec![("title", field(FieldType::String, true))]);
    let err = validate(&m, &fields(json!({}))).unwrap_err();
    assert!(matches!(err, Error::MissingField { field } if field == "title"));
  }

  #[test]
  fn present_required_field_passes() {
    let m = model(vec![("title", field(FieldType::String, true))]);
    assert!(validate(&m, &fields(json!({"title": "x"}))).is_ok());
  }

  #[test]
  fn optional_fields_may_be_absent() {
    let m = model(vec![("notes", field(FieldType::String, false))]);
    assert!(validate(&m, &fields(json!({}))).is_ok());
  }

  #[test]
  fn type_mismatches_are_rejected_per_type() {
    let m = model(vec![
      ("s", field(FieldType::String, false)),
      ("n", field(FieldType::Number, false)),
      ("b", field(FieldType::Boolean, false)),
      ("d", field(FieldType::Date, false)),
      ("v", field(FieldType::Vector, false)),
    ]);

    for bad in [
      json!({"s": 1}),
      json!({"n": "1"}),
      json!({"b": "true"}),
      json!({"d": "not a date"}),
      json!({"v": ["a", "b"]}),
      json!({"v": 3.0}),
    ] {
      assert!(
        matches!(validate(&m, &fields(bad.clone())), Err(Error::TypeMismatch { .. })),
        "expected type mismatch for {bad}"
      );
    }

    let good = json!({
      "s": "text",
      "n": 1.5,
      "b": true,
      "d": "2024-06-01T12:00:00Z",
      "v": [0.1, 0.2, 0.3],
    });
    assert!(validate(&m, &fields(good)).is_ok());
  }

  #[test]
  fn bare_dates_parse() {
    let m = model(vec![("d", field(FieldType::Date, false))]);
    assert!(validate(&m, &fields(json!({"d": "2024-06-01"}))).is_ok());
  }

  #[test]
  fn enum_membership_is_enforced() {
    let mut status = field(FieldType::String, false);
    status.enum_values = Some(vec![json!("open"), json!("closed")]);
    let m = model(vec![("status", status)]);

    assert!(validate(&m, &fields(json!({"status": "open"}))).is_ok());

    let err = validate(&m, &fields(json!({"status": "pending"}))).unwrap_err();
    match err {
      Error::EnumViolation { field, allowed } => {
        assert_eq!(field, "status");
        assert!(allowed.contains("open") && allowed.contains("closed"));
      }
      other => panic!("expected enum violation, got {other:?}"),
    }
  }

  #[test]
  fn undeclared_keys_pass_through() {
    let m = model(vec![("title", field(FieldType::String, true))]);
    let ok = json!({"title": "x", "extra": {"anything": [1, 2, 3]}});
    assert!(validate(&m, &fields(ok)).is_ok());
  }
}
