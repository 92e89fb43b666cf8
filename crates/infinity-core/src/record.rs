//! Data records — instances of a model's schema.
//!
//! A record is a bag of named JSON values plus system bookkeeping. The
//! embedding vector lives alongside the fields in storage but is never
//! serialized into an API response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fixed length of every stored embedding vector.
pub const EMBEDDING_DIM: usize = 1536;

/// A record's named values, keyed by field name.
pub type FieldMap = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRecord {
  #[serde(rename = "_id")]
  pub record_id:  Uuid,
  pub fields:     FieldMap,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Embedding storage; populated only when the owning model has embedding
  /// enabled. Excluded from serialization so it cannot leak into responses.
  #[serde(skip)]
  pub vector: Option<Vec<f32>>,
}

/// Parameters for [`crate::store::PlatformStore::list_records`].
///
/// `page` is 1-based. Filter keys other than `_id` match against the nested
/// field values; `_id` matches the record identifier.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
  pub filter: Option<FieldMap>,
  pub page:   u32,
  pub limit:  u32,
}

/// One page of records plus the total match count ignoring pagination.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
  pub records: Vec<DataRecord>,
  pub total:   u64,
}

/// A similarity-search hit: the record with its cosine score attached.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
  #[serde(flatten)]
  pub record:     DataRecord,
  pub similarity: f32,
}
