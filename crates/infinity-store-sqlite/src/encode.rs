//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields (field
//! maps, view configs, vectors) are stored as compact JSON. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use infinity_core::{
  model::{ModelDefinition, ModelStatus},
  record::{DataRecord, FieldMap},
  user::{ApiKey, ApiKeyStatus, SystemUser, UserStatus},
  view::ModelView,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Status enums ────────────────────────────────────────────────────────────

pub fn encode_model_status(s: ModelStatus) -> &'static str {
  match s {
    ModelStatus::Active => "active",
    ModelStatus::Archived => "archived",
  }
}

pub fn decode_model_status(s: &str) -> Result<ModelStatus> {
  match s {
    "active" => Ok(ModelStatus::Active),
    "archived" => Ok(ModelStatus::Archived),
    other => Err(Error::Decode(format!("unknown model status: {other:?}"))),
  }
}

pub fn encode_user_status(s: UserStatus) -> &'static str {
  match s {
    UserStatus::Active => "active",
    UserStatus::Inactive => "inactive",
  }
}

pub fn decode_user_status(s: &str) -> Result<UserStatus> {
  match s {
    "active" => Ok(UserStatus::Active),
    "inactive" => Ok(UserStatus::Inactive),
    other => Err(Error::Decode(format!("unknown user status: {other:?}"))),
  }
}

pub fn encode_api_key_status(s: ApiKeyStatus) -> &'static str {
  match s {
    ApiKeyStatus::Active => "active",
    ApiKeyStatus::Revoked => "revoked",
  }
}

pub fn decode_api_key_status(s: &str) -> Result<ApiKeyStatus> {
  match s {
    "active" => Ok(ApiKeyStatus::Active),
    "revoked" => Ok(ApiKeyStatus::Revoked),
    other => Err(Error::Decode(format!("unknown api key status: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &FieldMap) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(s: &str) -> Result<FieldMap> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_vector(vector: &[f32]) -> Result<String> {
  Ok(serde_json::to_string(vector)?)
}

pub fn decode_vector(s: &str) -> Result<Vec<f32>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `model_definitions` row.
pub struct RawModel {
  pub id:                 String,
  pub owner_id:           String,
  pub name:               String,
  pub description:        Option<String>,
  pub fields_json:        String,
  pub relationships_json: Option<String>,
  pub indexes_json:       Option<String>,
  pub embedding_json:     Option<String>,
  pub status:             String,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawModel {
  pub fn into_model(self) -> Result<ModelDefinition> {
    Ok(ModelDefinition {
      id:            decode_uuid(&self.id)?,
      owner_id:      decode_uuid(&self.owner_id)?,
      name:          self.name,
      description:   self.description,
      fields:        decode_json(&self.fields_json)?,
      relationships: self
        .relationships_json
        .as_deref()
        .map(decode_json)
        .transpose()?,
      indexes:       self.indexes_json.as_deref().map(decode_json).transpose()?,
      embedding:     self.embedding_json.as_deref().map(decode_json).transpose()?,
      status:        decode_model_status(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `data_records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub fields_json: String,
  pub vector_json: Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<DataRecord> {
    Ok(DataRecord {
      record_id:  decode_uuid(&self.record_id)?,
      fields:     decode_fields(&self.fields_json)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      vector:     self.vector_json.as_deref().map(decode_vector).transpose()?,
    })
  }

  /// Decode without the vector column — the projection used by list/get
  /// paths, which never expose vectors.
  pub fn into_projected(mut self) -> Result<DataRecord> {
    self.vector_json = None;
    self.into_record()
  }
}

/// Raw strings read directly from a `model_views` row.
pub struct RawView {
  pub id:          String,
  pub model_id:    String,
  pub owner_id:    String,
  pub name:        String,
  pub description: Option<String>,
  pub config_json: String,
  pub is_default:  bool,
  pub is_public:   bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawView {
  pub fn into_view(self) -> Result<ModelView> {
    Ok(ModelView {
      id:          decode_uuid(&self.id)?,
      model_id:    decode_uuid(&self.model_id)?,
      owner_id:    decode_uuid(&self.owner_id)?,
      name:        self.name,
      description: self.description,
      config:      decode_json(&self.config_json)?,
      is_default:  self.is_default,
      is_public:   self.is_public,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub id:            String,
  pub username:      String,
  pub email:         String,
  pub name:          String,
  pub status:        String,
  pub password_hash: String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawUser {
  pub fn into_user(self) -> Result<SystemUser> {
    Ok(SystemUser {
      id:            decode_uuid(&self.id)?,
      username:      self.username,
      email:         self.email,
      name:          self.name,
      status:        decode_user_status(&self.status)?,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `api_keys` row.
pub struct RawApiKey {
  pub id:           String,
  pub user_id:      String,
  pub key_hash:     String,
  pub name:         String,
  pub status:       String,
  pub last_used_at: Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawApiKey {
  pub fn into_api_key(self) -> Result<ApiKey> {
    Ok(ApiKey {
      id:           decode_uuid(&self.id)?,
      user_id:      decode_uuid(&self.user_id)?,
      key_hash:     self.key_hash,
      name:         self.name,
      status:       decode_api_key_status(&self.status)?,
      last_used_at: self.last_used_at.as_deref().map(decode_dt).transpose()?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}
