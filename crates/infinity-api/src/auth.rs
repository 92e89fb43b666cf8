//! Authentication: JWT issue/verify, password hashing, API keys, and the
//! axum extractors gating every data-plane route.
//!
//! Interactive clients authenticate with an HS256 JWT carried in a `Bearer`
//! header or the HTTP-only `token` cookie; public integrations use an
//! `x-api-key` header. Revoked JWTs are denylisted by digest until expiry.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, Path, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
  response::{AppendHeaders, IntoResponse},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use infinity_core::{
  store::PlatformStore,
  user::{ApiKey, NewUser, UserStatus},
};
use infinity_embed::EmbeddingProvider;

use crate::{AppState, ApiError, response};

/// Name of the HTTP-only session cookie.
pub const TOKEN_COOKIE: &str = "token";

const TOKEN_TTL_HOURS: i64 = 24;
const API_KEY_RANDOM_BYTES: usize = 32;

// ─── JWT ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:   Uuid,
  pub email: String,
  pub name:  String,
  pub exp:   i64,
}

pub fn issue_token(
  user: &infinity_core::user::SystemUser,
  secret: &str,
) -> Result<String, ApiError> {
  let claims = Claims {
    sub:   user.id,
    email: user.email.clone(),
    name:  user.name.clone(),
    exp:   (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
  };

  jsonwebtoken::encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(secret.as_bytes()),
  )
  .map_err(|e| ApiError::internal(format!("jwt encode: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
  jsonwebtoken::decode::<Claims>(
    token,
    &DecodingKey::from_secret(secret.as_bytes()),
    &Validation::default(),
  )
  .map(|data| data.claims)
  .map_err(|_| ApiError::Unauthorized("invalid token".to_string()))
}

/// Digest used for the revocation denylist — the raw token never lands in
/// storage.
pub fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

// ─── Passwords ───────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::internal(format!("argon2: {e}")))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc).is_ok_and(|parsed| {
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
}

// ─── API keys ────────────────────────────────────────────────────────────────

/// Mint a plain key: configured prefix + 64 hex chars of OS entropy.
pub fn generate_api_key(prefix: &str) -> String {
  let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
  OsRng.fill_bytes(&mut bytes);
  format!("{prefix}{}", hex::encode(bytes))
}

pub fn api_key_format_valid(prefix: &str, key: &str) -> bool {
  key.strip_prefix(prefix).is_some_and(|rest| {
    rest.len() == API_KEY_RANDOM_BYTES * 2
      && rest.bytes().all(|b| b.is_ascii_hexdigit())
  })
}

pub fn hash_api_key(key: &str) -> String {
  hex::encode(Sha256::digest(key.as_bytes()))
}

// ─── Extractors ──────────────────────────────────────────────────────────────

fn bearer_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::to_owned)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
  let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
  cookies
    .split(';')
    .map(str::trim)
    .find_map(|c| c.strip_prefix("token="))
    .map(str::to_owned)
}

/// A request authenticated by JWT — Bearer header first, cookie second.
pub struct AuthUser {
  pub user_id: Uuid,
  pub claims:  Claims,
  pub token:   String,
}

impl<S, P> FromRequestParts<AppState<S, P>> for AuthUser
where
  S: PlatformStore + 'static,
  P: EmbeddingProvider + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, P>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)
      .or_else(|| cookie_token(&parts.headers))
      .ok_or_else(|| {
        ApiError::Unauthorized("no authorization token found".to_string())
      })?;

    let claims = verify_token(&token, &state.config.jwt_secret)?;

    let revoked = state
      .store
      .is_token_revoked(&hash_token(&token))
      .await
      .map_err(ApiError::store)?;
    if revoked {
      return Err(ApiError::Unauthorized("token has been revoked".to_string()));
    }

    Ok(AuthUser { user_id: claims.sub, claims, token })
  }
}

/// A request authenticated by `x-api-key`, resolved to the key's owner.
pub struct ApiKeyUser {
  pub user_id: Uuid,
  pub key:     ApiKey,
}

impl<S, P> FromRequestParts<AppState<S, P>> for ApiKeyUser
where
  S: PlatformStore + 'static,
  P: EmbeddingProvider + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, P>,
  ) -> Result<Self, Self::Rejection> {
    let key = parts
      .headers
      .get("x-api-key")
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| ApiError::Unauthorized("API key is required".to_string()))?;

    if !api_key_format_valid(&state.config.api_key_prefix, key) {
      return Err(ApiError::Unauthorized("invalid API key format".to_string()));
    }

    let found = state
      .store
      .find_api_key_by_hash(&hash_api_key(key))
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::Unauthorized("invalid API key".to_string()))?;

    Ok(ApiKeyUser { user_id: found.user_id, key: found })
  }
}

// ─── Cookie plumbing ─────────────────────────────────────────────────────────

fn session_cookie(token: &str) -> String {
  format!(
    "{TOKEN_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
    TOKEN_TTL_HOURS * 3600
  )
}

fn clear_cookie() -> String {
  format!("{TOKEN_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub email:    String,
  pub name:     String,
  pub password: String,
}

/// `POST /api/auth/register`
pub async fn register<S, P>(
  State(state): State<AppState<S, P>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  if body.username.trim().is_empty() {
    return Err(ApiError::field_validation("username", "username is required"));
  }
  if !body.email.contains('@') {
    return Err(ApiError::field_validation("email", "a valid email is required"));
  }
  if body.password.len() < 8 {
    return Err(ApiError::field_validation(
      "password",
      "password must be at least 8 characters",
    ));
  }

  let user = state
    .store
    .create_user(NewUser {
      username:      body.username,
      email:         body.email,
      name:          body.name,
      password_hash: hash_password(&body.password)?,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(user = %user.id, "registered user");
  Ok(response::created(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

/// `POST /api/auth/login` — verifies credentials, sets the session cookie.
pub async fn login<S, P>(
  State(state): State<AppState<S, P>>,
  Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let user = state
    .store
    .find_user_by_username(&body.username)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::BadCredentials {
      field:   "username",
      message: "No account found with this username",
    })?;

  if user.status != UserStatus::Active {
    return Err(ApiError::Forbidden(
      "Account is inactive. Please contact support.".to_string(),
    ));
  }

  if !verify_password(&body.password, &user.password_hash) {
    return Err(ApiError::BadCredentials {
      field:   "password",
      message: "Incorrect password",
    });
  }

  let token = issue_token(&user, &state.config.jwt_secret)?;

  Ok((
    AppendHeaders([(header::SET_COOKIE, session_cookie(&token))]),
    response::ok(json!({ "user": user, "token": token })),
  ))
}

/// `GET /api/auth/logout` — clears the session cookie.
pub async fn logout<S, P>(
  State(_state): State<AppState<S, P>>,
) -> impl IntoResponse
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  (
    AppendHeaders([(header::SET_COOKIE, clear_cookie())]),
    response::ok(json!(null)),
  )
}

/// `GET /api/auth/me`
pub async fn me<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let user = state
    .store
    .get_user(auth.user_id)
    .await
    .map_err(ApiError::store)?
    .filter(|u| u.status == UserStatus::Active)
    .ok_or_else(|| ApiError::Unauthorized("invalid session".to_string()))?;

  Ok(response::ok(user))
}

/// `POST /api/auth/token/revoke` — denylists the presented token.
pub async fn revoke_token<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  state
    .store
    .revoke_token(&hash_token(&auth.token), auth.user_id)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(user = %auth.user_id, "revoked token");
  Ok((
    AppendHeaders([(header::SET_COOKIE, clear_cookie())]),
    response::ok(json!(null)),
  ))
}

/// `GET /api/auth/apikey`
pub async fn list_api_keys<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let keys = state
    .store
    .list_api_keys(auth.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(keys))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyBody {
  pub name: String,
}

/// `POST /api/auth/apikey` — the plain key appears in this response only.
pub async fn create_api_key<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Json(body): Json<CreateApiKeyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::field_validation("name", "a key name is required"));
  }

  let plain = generate_api_key(&state.config.api_key_prefix);
  let key = state
    .store
    .create_api_key(auth.user_id, &body.name, &hash_api_key(&plain))
    .await
    .map_err(ApiError::store)?;

  let mut data = serde_json::to_value(&key)?;
  data["key"] = json!(plain);

  tracing::info!(user = %auth.user_id, key = %key.id, "created api key");
  Ok(response::created(data))
}

/// `DELETE /api/auth/apikey/{id}`
pub async fn delete_api_key<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  state
    .store
    .delete_api_key(id, auth.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use infinity_core::user::{SystemUser, UserStatus};

  use super::*;

  fn user() -> SystemUser {
    SystemUser {
      id:            Uuid::new_v4(),
      username:      "alice".to_string(),
      email:         "alice@example.com".to_string(),
      name:          "Alice".to_string(),
      status:        UserStatus::Active,
      password_hash: String::new(),
      created_at:    Utc::now(),
      updated_at:    Utc::now(),
    }
  }

  #[test]
  fn token_roundtrip_preserves_claims() {
    let u = user();
    let token = issue_token(&u, "secret").unwrap();
    let claims = verify_token(&token, "secret").unwrap();
    assert_eq!(claims.sub, u.id);
    assert_eq!(claims.email, u.email);
    assert!(claims.exp > Utc::now().timestamp());
  }

  #[test]
  fn token_signed_with_wrong_secret_is_rejected() {
    let token = issue_token(&user(), "secret").unwrap();
    assert!(verify_token(&token, "other-secret").is_err());
  }

  #[test]
  fn password_hash_verifies_and_rejects() {
    let phc = hash_password("correct horse").unwrap();
    assert!(verify_password("correct horse", &phc));
    assert!(!verify_password("battery staple", &phc));
    assert!(!verify_password("correct horse", "not-a-phc-string"));
  }

  #[test]
  fn api_key_format_and_digest() {
    let key = generate_api_key("inf_");
    assert!(api_key_format_valid("inf_", &key));
    assert!(!api_key_format_valid("inf_", "inf_short"));
    assert!(!api_key_format_valid("inf_", &format!("oops_{}", "0".repeat(64))));

    // Distinct keys, distinct digests; digest is stable.
    let other = generate_api_key("inf_");
    assert_ne!(key, other);
    assert_eq!(hash_api_key(&key), hash_api_key(&key));
    assert_ne!(hash_api_key(&key), hash_api_key(&other));
  }
}
