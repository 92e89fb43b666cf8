//! Saved table views — per-user presentation config over a model's records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::ModelDefinition;

// ─── Column configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
  Text,
  Number,
  Date,
  Boolean,
  Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFormat {
  #[serde(rename = "type")]
  pub format_type: FormatType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Value>,
  #[serde(
    default,
    rename = "customFormatter",
    skip_serializing_if = "Option::is_none"
  )]
  pub custom_formatter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewColumn {
  pub field:      String,
  pub visible:    bool,
  pub width:      u32,
  pub format:     ColumnFormat,
  pub sortable:   bool,
  pub filterable: bool,
}

// ─── Sorting / filtering ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  Asc,
  Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSort {
  pub field:     String,
  pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
  Equals,
  NotEquals,
  Contains,
  NotContains,
  StartsWith,
  EndsWith,
  Gt,
  Gte,
  Lt,
  Lte,
  Between,
  In,
  NotIn,
  IsNull,
  IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
  And,
  Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewFilter {
  pub field:    String,
  pub operator: FilterOperator,
  #[serde(default)]
  pub value: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub conjunction: Option<Conjunction>,
}

// ─── Layout ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
  Compact,
  Normal,
  Comfortable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  Light,
  Dark,
  System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewLayout {
  pub density: Density,
  pub theme:   Theme,
}

impl Default for ViewLayout {
  fn default() -> Self {
    Self { density: Density::Normal, theme: Theme::System }
  }
}

// ─── View configuration ──────────────────────────────────────────────────────

/// Full table configuration. `grouping` and `realtime` are persisted opaquely:
/// the dashboard interprets them, the server only stores them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
  pub columns: Vec<ViewColumn>,
  #[serde(default)]
  pub filters: Vec<ViewFilter>,
  #[serde(default = "default_sorting")]
  pub sorting: Vec<ViewSort>,
  #[serde(default)]
  pub layout: ViewLayout,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grouping: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub realtime: Option<Value>,
}

fn default_sorting() -> Vec<ViewSort> {
  vec![ViewSort {
    field:     "_id".to_string(),
    direction: SortDirection::Asc,
  }]
}

impl ViewConfig {
  /// The auto-generated default presentation for `model`: one visible,
  /// sortable, filterable text column per declared field, sorted by `_id`
  /// ascending.
  pub fn default_for(model: &ModelDefinition) -> Self {
    Self {
      columns: model
        .fields
        .keys()
        .map(|field| ViewColumn {
          field:      field.clone(),
          visible:    true,
          width:      150,
          format:     ColumnFormat {
            format_type:      FormatType::Text,
            options:          None,
            custom_formatter: None,
          },
          sortable:   true,
          filterable: true,
        })
        .collect(),
      filters: vec![],
      sorting: default_sorting(),
      layout: ViewLayout::default(),
      grouping: None,
      realtime: None,
    }
  }
}

// ─── Model view ──────────────────────────────────────────────────────────────

/// A saved table presentation over one model's records.
///
/// At most one view per (model, owner) scope carries `is_default = true`;
/// the store enforces the swap transactionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelView {
  pub id:          Uuid,
  pub model_id:    Uuid,
  pub owner_id:    Uuid,
  pub name:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub config:      ViewConfig,
  pub is_default:  bool,
  pub is_public:   bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input for creating a view; id and timestamps are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewView {
  pub model_id:    Uuid,
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  pub config:      ViewConfig,
  #[serde(default)]
  pub is_default:  bool,
  #[serde(default)]
  pub is_public:   bool,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewPatch {
  pub name:        Option<String>,
  pub description: Option<String>,
  pub config:      Option<ViewConfig>,
  pub is_default:  Option<bool>,
  pub is_public:   Option<bool>,
}
