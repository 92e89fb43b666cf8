//! Embedding orchestration over a model's configured source fields.

use infinity_core::{
  model::ModelDefinition,
  record::{DataRecord, EMBEDDING_DIM, FieldMap, ScoredRecord},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result, provider::EmbeddingProvider};

// ─── Failure policy ──────────────────────────────────────────────────────────

/// What a provider failure does to the surrounding write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingPolicy {
  /// A provider failure fails the write.
  #[default]
  Required,
  /// The write commits without a fresh vector; the failure is logged.
  BestEffort,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Derives embedding vectors for records and search queries.
pub struct EmbeddingService<P> {
  provider: P,
  policy:   EmbeddingPolicy,
}

impl<P: EmbeddingProvider> EmbeddingService<P> {
  pub fn new(provider: P, policy: EmbeddingPolicy) -> Self {
    Self { provider, policy }
  }

  pub fn policy(&self) -> EmbeddingPolicy {
    self.policy
  }

  /// The text blob to embed for `fields`: source-field values in configured
  /// order, stringified, empties skipped, joined with single spaces.
  /// `None` when embedding is off or nothing remains to embed.
  pub fn source_text(model: &ModelDefinition, fields: &FieldMap) -> Option<String> {
    let config = model.embedding.as_ref().filter(|e| e.enabled)?;

    let text = config
      .source_fields
      .iter()
      .filter_map(|name| fields.get(name))
      .map(stringify)
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(" ");

    (!text.is_empty()).then_some(text)
  }

  /// Embed the record content for a write, applying the configured failure
  /// policy. `Ok(None)` when there is nothing to embed, or when the
  /// provider failed under [`EmbeddingPolicy::BestEffort`].
  pub async fn embed_for_write(
    &self,
    model: &ModelDefinition,
    fields: &FieldMap,
  ) -> Result<Option<Vec<f32>>> {
    let Some(text) = Self::source_text(model, fields) else {
      return Ok(None);
    };

    match self.embed_checked(&text).await {
      Ok(vector) => Ok(Some(vector)),
      Err(err) if self.policy == EmbeddingPolicy::BestEffort => {
        tracing::warn!(model = %model.id, error = %err, "embedding failed; committing without a fresh vector");
        Ok(None)
      }
      Err(err) => Err(err),
    }
  }

  /// Embed a search query. Always fatal on failure — there is no result
  /// without a query vector.
  pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
    self.embed_checked(query).await
  }

  async fn embed_checked(&self, text: &str) -> Result<Vec<f32>> {
    let vector = self.provider.embed(text).await?;
    if vector.len() != EMBEDDING_DIM {
      return Err(Error::Dimension {
        expected: EMBEDDING_DIM,
        actual:   vector.len(),
      });
    }
    Ok(vector)
  }
}

fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

// ─── Similarity ranking ──────────────────────────────────────────────────────

/// Cosine similarity over raw f32 slices; 0 when either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  let mut dot = 0.0_f32;
  let mut norm_a = 0.0_f32;
  let mut norm_b = 0.0_f32;

  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }

  let magnitude = norm_a.sqrt() * norm_b.sqrt();
  if magnitude == 0.0 { 0.0 } else { dot / magnitude }
}

/// Rank `candidates` against `query` by cosine similarity, descending.
/// Results below `min_similarity` are dropped, the rest truncated to
/// `limit`. Vectors are consumed by scoring and never reach the output.
pub fn rank(
  query: &[f32],
  candidates: Vec<DataRecord>,
  limit: usize,
  min_similarity: f32,
) -> Vec<ScoredRecord> {
  let mut scored: Vec<ScoredRecord> = candidates
    .into_iter()
    .filter_map(|mut record| {
      let vector = record.vector.take()?;
      let similarity = cosine_similarity(query, &vector);
      (similarity >= min_similarity)
        .then_some(ScoredRecord { record, similarity })
    })
    .collect();

  scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
  scored.truncate(limit);
  scored
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use chrono::Utc;
  use infinity_core::model::{
    EmbeddingConfig, FieldDefinition, FieldType, ModelStatus,
  };
  use serde_json::{Map, json};
  use uuid::Uuid;

  use super::*;
  use crate::provider::HashEmbeddings;

  fn model(source_fields: Vec<&str>, enabled: bool) -> ModelDefinition {
    let fields = source_fields
      .iter()
      .map(|name| {
        (name.to_string(), FieldDefinition {
          id:          Uuid::new_v4(),
          field_type:  FieldType::String,
          required:    false,
          unique:      false,
          default:     None,
          enum_values: None,
          description: None,
          foreign_key: None,
        })
      })
      .collect::<BTreeMap<_, _>>();

    ModelDefinition {
      id: Uuid::new_v4(),
      owner_id: Uuid::new_v4(),
      name: "articles".to_string(),
      description: None,
      fields,
      relationships: None,
      indexes: None,
      embedding: Some(EmbeddingConfig {
        enabled,
        source_fields: source_fields.iter().map(|s| s.to_string()).collect(),
      }),
      status: ModelStatus::Active,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn field_map(value: serde_json::Value) -> FieldMap {
    match value {
      serde_json::Value::Object(map) => map,
      _ => Map::new(),
    }
  }

  fn record(vector: Option<Vec<f32>>) -> DataRecord {
    DataRecord {
      record_id: Uuid::new_v4(),
      fields: Map::new(),
      created_at: Utc::now(),
      updated_at: Utc::now(),
      vector,
    }
  }

  type Service = EmbeddingService<HashEmbeddings>;

  #[test]
  fn source_text_joins_in_configured_order() {
    let m = model(vec!["title", "summary"], true);
    let f = field_map(json!({"summary": "world", "title": "hello"}));
    assert_eq!(Service::source_text(&m, &f), Some("hello world".to_string()));
  }

  #[test]
  fn source_text_skips_empty_values_and_stringifies_others() {
    let m = model(vec!["title", "summary", "rating"], true);
    let f = field_map(json!({"title": "", "summary": "short", "rating": 4}));
    assert_eq!(Service::source_text(&m, &f), Some("short 4".to_string()));
  }

  #[test]
  fn source_text_is_none_when_disabled_or_empty() {
    let disabled = model(vec!["title"], false);
    let f = field_map(json!({"title": "hello"}));
    assert_eq!(Service::source_text(&disabled, &f), None);

    let enabled = model(vec!["title"], true);
    assert_eq!(Service::source_text(&enabled, &field_map(json!({}))), None);
  }

  #[tokio::test]
  async fn embed_for_write_produces_fixed_length_vectors() {
    let service =
      EmbeddingService::new(HashEmbeddings::new(), EmbeddingPolicy::Required);
    let m = model(vec!["title"], true);
    let f = field_map(json!({"title": "hello world"}));

    let first = service.embed_for_write(&m, &f).await.unwrap().unwrap();
    let second = service.embed_for_write(&m, &f).await.unwrap().unwrap();
    assert_eq!(first.len(), EMBEDDING_DIM);
    assert_eq!(second.len(), EMBEDDING_DIM);
    assert_eq!(first, second, "refresh is idempotent for unchanged content");
  }

  #[tokio::test]
  async fn embed_for_write_skips_models_without_content() {
    let service =
      EmbeddingService::new(HashEmbeddings::new(), EmbeddingPolicy::Required);
    let m = model(vec!["title"], false);
    let f = field_map(json!({"title": "hello"}));
    assert!(service.embed_for_write(&m, &f).await.unwrap().is_none());
  }

  #[test]
  fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
  }

  #[test]
  fn rank_orders_thresholds_and_truncates() {
    let query = vec![1.0, 0.0];
    let candidates = vec![
      record(Some(vec![1.0, 0.0])),   // similarity 1.0
      record(Some(vec![1.0, 1.0])),   // ~0.707
      record(Some(vec![0.0, 1.0])),   // 0.0
      record(Some(vec![-1.0, 0.0])),  // -1.0
      record(None),                   // no vector: skipped
    ];

    let hits = rank(&query, candidates, 10, 0.5);
    assert_eq!(hits.len(), 2);
    assert!(hits[0].similarity > hits[1].similarity);
    assert!(hits.iter().all(|h| h.record.vector.is_none()));

    let top_one = rank(&[1.0, 0.0], vec![
      record(Some(vec![1.0, 0.0])),
      record(Some(vec![1.0, 1.0])),
    ], 1, 0.0);
    assert_eq!(top_one.len(), 1);
    assert!((top_one[0].similarity - 1.0).abs() < 1e-6);
  }
}
