//! Embedding providers.

use std::future::Future;

use infinity_core::record::EMBEDDING_DIM;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A source of fixed-length embedding vectors for arbitrary text.
///
/// Implementations must return vectors of [`EMBEDDING_DIM`] length; the
/// service layer re-checks and rejects anything else.
pub trait EmbeddingProvider: Send + Sync {
  fn embed<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<f32>>> + Send + 'a;
}

// ─── OpenAI-compatible HTTP provider ─────────────────────────────────────────

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
  http:     reqwest::Client,
  api_key:  String,
  base_url: String,
  model:    String,
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";

impl OpenAiEmbeddings {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      http:     reqwest::Client::new(),
      api_key:  api_key.into(),
      base_url: DEFAULT_BASE_URL.to_string(),
      model:    DEFAULT_MODEL.to_string(),
    }
  }

  /// Point at a compatible self-hosted endpoint instead of api.openai.com.
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
}

impl EmbeddingProvider for OpenAiEmbeddings {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

    let response = self
      .http
      .post(&url)
      .bearer_auth(&self.api_key)
      .json(&EmbeddingRequest { model: &self.model, input: text })
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Provider(format!("{status}: {body}")));
    }

    let parsed: EmbeddingResponse = response.json().await?;
    parsed
      .data
      .into_iter()
      .next()
      .map(|d| d.embedding)
      .ok_or_else(|| Error::Provider("response contained no embedding".to_string()))
  }
}

// ─── Deterministic hashing provider ──────────────────────────────────────────

/// Token-hashing embedder: each whitespace token is hashed onto one
/// dimension with an alternating sign, and the result is L2-normalised.
///
/// Not semantically meaningful, but deterministic and dimension-correct —
/// identical texts map to identical unit vectors, overlapping texts to
/// correlated ones. Used when no provider credential is configured, and in
/// tests.
pub struct HashEmbeddings {
  dim: usize,
}

impl HashEmbeddings {
  pub fn new() -> Self {
    Self { dim: EMBEDDING_DIM }
  }
}

impl Default for HashEmbeddings {
  fn default() -> Self {
    Self::new()
  }
}

// FNV-1a, the usual cheap stable string hash.
fn fnv1a(token: &str) -> u64 {
  let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
  for byte in token.as_bytes() {
    hash ^= u64::from(*byte);
    hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
  }
  hash
}

impl EmbeddingProvider for HashEmbeddings {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let mut components = vec![0.0_f32; self.dim];

    for token in text.split_whitespace() {
      let hash = fnv1a(&token.to_lowercase());
      let index = (hash % self.dim as u64) as usize;
      let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
      components[index] += sign;
    }

    let magnitude: f32 = components.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
      for x in &mut components {
        *x /= magnitude;
      }
    }

    Ok(components)
  }
}

// ─── Config-selected provider ────────────────────────────────────────────────

/// The provider chosen at startup from configuration.
pub enum AnyProvider {
  OpenAi(OpenAiEmbeddings),
  Hash(HashEmbeddings),
}

impl EmbeddingProvider for AnyProvider {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    match self {
      AnyProvider::OpenAi(p) => p.embed(text).await,
      AnyProvider::Hash(p) => p.embed(text).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn hash_embeddings_are_deterministic_unit_vectors() {
    let provider = HashEmbeddings::new();

    let a = provider.embed("neural networks").await.unwrap();
    let b = provider.embed("neural networks").await.unwrap();
    assert_eq!(a.len(), EMBEDDING_DIM);
    assert_eq!(a, b);

    let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((magnitude - 1.0).abs() < 1e-5, "magnitude {magnitude}");
  }

  #[tokio::test]
  async fn overlapping_texts_correlate_more_than_disjoint_ones() {
    let provider = HashEmbeddings::new();

    let base = provider.embed("deep neural networks").await.unwrap();
    let near = provider.embed("neural networks overview").await.unwrap();
    let far = provider.embed("pasta carbonara recipe").await.unwrap();

    let sim = |a: &[f32], b: &[f32]| -> f32 {
      a.iter().zip(b).map(|(x, y)| x * y).sum()
    };
    assert!(sim(&base, &near) > sim(&base, &far));
  }

  #[tokio::test]
  async fn empty_text_embeds_to_the_zero_vector() {
    let provider = HashEmbeddings::new();
    let v = provider.embed("").await.unwrap();
    assert_eq!(v.len(), EMBEDDING_DIM);
    assert!(v.iter().all(|x| *x == 0.0));
  }
}
