//! System identity records: users and their API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
  Active,
  Inactive,
}

/// A platform account. The password hash is an argon2 PHC string and is
/// never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemUser {
  pub id:       Uuid,
  pub username: String,
  pub email:    String,
  pub name:     String,
  pub status:   UserStatus,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input for registering a user; the caller hashes the password first.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  pub name:          String,
  pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
  Active,
  Revoked,
}

/// A long-lived credential for public API access, scoped to one user.
///
/// Only the SHA-256 digest of the key is stored; the plain key is shown to
/// the owner exactly once, at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
  pub id:      Uuid,
  pub user_id: Uuid,
  #[serde(skip_serializing)]
  pub key_hash: String,
  pub name:   String,
  pub status: ApiKeyStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_used_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
