//! Error types for `infinity-core`.
//!
//! This is the taxonomy every other crate converts into; the API layer maps
//! each variant onto an HTTP status.

use thiserror::Error;
use uuid::Uuid;

use crate::model::FieldType;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────

  #[error("missing required field: {field}")]
  MissingField { field: String },

  #[error("field {field} must be a {expected}")]
  TypeMismatch { field: String, expected: FieldType },

  #[error("invalid value for field {field}; must be one of: {allowed}")]
  EnumViolation { field: String, allowed: String },

  #[error("model name {0:?} may only contain letters, numbers, and hyphens")]
  InvalidModelName(String),

  #[error("field {field} uses the reserved type {field_type}")]
  ReservedFieldType { field: String, field_type: FieldType },

  #[error("relationship {relationship} references undeclared field {field}")]
  InvalidRelationship { relationship: String, field: String },

  #[error("at least one source field is required when embedding is enabled")]
  NoEmbeddingSources,

  #[error("embedding source field {field} must be a declared string field")]
  InvalidEmbeddingSource { field: String },

  // ── Not found ─────────────────────────────────────────────────────────

  #[error("model not found: {0}")]
  ModelNotFound(Uuid),

  #[error("model not found: {0}")]
  ModelNameNotFound(String),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("view not found: {0}")]
  ViewNotFound(Uuid),

  #[error("api key not found: {0}")]
  ApiKeyNotFound(Uuid),

  // ── Conflicts ─────────────────────────────────────────────────────────

  #[error("model name {0:?} is already taken")]
  ModelNameTaken(String),

  #[error("email or username already registered")]
  UserExists,

  #[error("cannot delete the last view for a model")]
  LastView,

  // ── Ownership ─────────────────────────────────────────────────────────

  #[error("not the owner of this resource")]
  NotOwner,

  // ── Plumbing ──────────────────────────────────────────────────────────

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Unexpected backend failure; details are for logs, not clients.
  #[error("storage error: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
