//! Embedding orchestration for the Infinity platform.
//!
//! On writes to embedding-enabled models, the configured source fields are
//! concatenated into one text blob and embedded by a provider; on search,
//! the query text is embedded the same way and candidates are ranked by
//! cosine similarity. Providers are pluggable behind [`EmbeddingProvider`]:
//! an OpenAI-compatible HTTP client for production and a deterministic
//! hashing embedder for offline use and tests.

pub mod error;
pub mod provider;
pub mod service;

pub use error::{Error, Result};
pub use provider::{AnyProvider, EmbeddingProvider, HashEmbeddings, OpenAiEmbeddings};
pub use service::{EmbeddingPolicy, EmbeddingService, cosine_similarity, rank};
