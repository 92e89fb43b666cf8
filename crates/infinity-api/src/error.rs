//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error becomes a JSON body of the shape
//! `{"error": {"message": ..., "field"?: ...}}` with a status matching the
//! error kind. Unexpected failures are logged with context and surface as a
//! generic 500 so internals never leak.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Bad input shape, type, or constraint — 400.
  #[error("{message}")]
  Validation {
    field:   Option<String>,
    message: String,
  },

  /// Missing or invalid credential — 401.
  #[error("{0}")]
  Unauthorized(String),

  /// Credential rejected with a field the UI can highlight — 401.
  #[error("{message}")]
  BadCredentials {
    field:   &'static str,
    message: &'static str,
  },

  /// Authenticated but not allowed — 403.
  #[error("{0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// Duplicate name or similar uniqueness clash — 409.
  #[error("{0}")]
  Conflict(String),

  /// The external embedding call failed — 500, but with a message that
  /// distinguishes it from storage trouble.
  #[error("{0}")]
  EmbeddingProvider(String),

  #[error("internal error")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn validation(message: impl Into<String>) -> Self {
    ApiError::Validation { field: None, message: message.into() }
  }

  pub fn field_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
    ApiError::Validation {
      field:   Some(field.into()),
      message: message.into(),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    ApiError::Internal(message.into().into())
  }

  /// Convert any store error through the core taxonomy.
  pub fn store<E: Into<infinity_core::Error>>(err: E) -> Self {
    ApiError::from(err.into())
  }
}

impl From<infinity_core::Error> for ApiError {
  fn from(err: infinity_core::Error) -> Self {
    use infinity_core::Error as E;
    match err {
      E::MissingField { ref field }
      | E::TypeMismatch { ref field, .. }
      | E::EnumViolation { ref field, .. } => ApiError::Validation {
        field:   Some(field.clone()),
        message: err.to_string(),
      },
      E::InvalidModelName(_)
      | E::ReservedFieldType { .. }
      | E::InvalidRelationship { .. }
      | E::NoEmbeddingSources
      | E::InvalidEmbeddingSource { .. } => {
        ApiError::Validation { field: None, message: err.to_string() }
      }
      E::ModelNotFound(_)
      | E::ModelNameNotFound(_)
      | E::RecordNotFound(_)
      | E::ViewNotFound(_)
      | E::ApiKeyNotFound(_) => ApiError::NotFound(err.to_string()),
      E::ModelNameTaken(_) | E::UserExists | E::LastView => {
        ApiError::Conflict(err.to_string())
      }
      E::NotOwner => ApiError::Forbidden(err.to_string()),
      E::Serialization(_) | E::Storage(_) => ApiError::Internal(Box::new(err)),
    }
  }
}

impl From<infinity_embed::Error> for ApiError {
  fn from(err: infinity_embed::Error) -> Self {
    ApiError::EmbeddingProvider(err.to_string())
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Internal(Box::new(err))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, field, message) = match self {
      ApiError::Validation { field, message } => {
        (StatusCode::BAD_REQUEST, field, message)
      }
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, None, m),
      ApiError::BadCredentials { field, message } => (
        StatusCode::UNAUTHORIZED,
        Some(field.to_string()),
        message.to_string(),
      ),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, None, m),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, None, m),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, None, m),
      ApiError::EmbeddingProvider(m) => {
        (StatusCode::INTERNAL_SERVER_ERROR, None, m)
      }
      ApiError::Internal(source) => {
        tracing::error!(error = %source, "internal error");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          None,
          "internal server error".to_string(),
        )
      }
    };

    let body = match field {
      Some(field) => json!({ "error": { "message": message, "field": field } }),
      None => json!({ "error": { "message": message } }),
    };
    (status, Json(body)).into_response()
  }
}
