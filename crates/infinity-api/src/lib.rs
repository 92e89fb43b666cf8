//! JSON REST API for the Infinity data platform.
//!
//! Exposes an axum [`Router`] backed by any
//! [`infinity_core::store::PlatformStore`] plus an
//! [`infinity_embed::EmbeddingProvider`]. TLS and reverse-proxy concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = infinity_api::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod data;
pub mod error;
pub mod models;
pub mod public;
pub mod response;
pub mod views;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use infinity_core::{model::ModelDefinition, store::PlatformStore};
use infinity_embed::{EmbeddingPolicy, EmbeddingProvider, EmbeddingService};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `INFINITY_`-prefixed environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// HS256 signing secret for session JWTs.
  pub jwt_secret: String,
  #[serde(default = "default_api_key_prefix")]
  pub api_key_prefix: String,
  #[serde(default = "default_max_page_size")]
  pub max_page_size: u32,
  #[serde(default)]
  pub embedding_policy: EmbeddingPolicy,
  /// Credential for the embedding endpoint; without one, the server falls
  /// back to the deterministic local embedder.
  #[serde(default)]
  pub embedding_api_key: Option<String>,
  #[serde(default)]
  pub embedding_base_url: Option<String>,
  #[serde(default)]
  pub embedding_model: Option<String>,
}

fn default_api_key_prefix() -> String { "inf_".to_string() }

fn default_max_page_size() -> u32 { 100 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub store:      Arc<S>,
  pub embeddings: Arc<EmbeddingService<P>>,
  pub config:     Arc<ServerConfig>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      embeddings: Arc::clone(&self.embeddings),
      config:     Arc::clone(&self.config),
    }
  }
}

/// Resolve a model and require the caller to own it.
pub(crate) async fn resolve_owned_model<S, P>(
  state: &AppState<S, P>,
  model_id: Uuid,
  user_id: Uuid,
) -> Result<ModelDefinition, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = state
    .store
    .get_model(model_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("model {model_id} not found")))?;

  if model.owner_id != user_id {
    return Err(ApiError::Forbidden(
      "You do not own this model".to_string(),
    ));
  }
  Ok(model)
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full `/api` router for `state`.
pub fn router<S, P>(state: AppState<S, P>) -> Router
where
  S: PlatformStore + 'static,
  P: EmbeddingProvider + 'static,
{
  let api = Router::new()
    // Auth
    .route("/auth/register", post(auth::register::<S, P>))
    .route("/auth/login", post(auth::login::<S, P>))
    .route("/auth/logout", get(auth::logout::<S, P>))
    .route("/auth/me", get(auth::me::<S, P>))
    .route("/auth/token/revoke", post(auth::revoke_token::<S, P>))
    .route(
      "/auth/apikey",
      get(auth::list_api_keys::<S, P>).post(auth::create_api_key::<S, P>),
    )
    .route("/auth/apikey/{id}", delete(auth::delete_api_key::<S, P>))
    // Model definitions
    .route("/models", get(models::list::<S, P>).post(models::create::<S, P>))
    .route(
      "/models/{id}",
      get(models::get_one::<S, P>)
        .put(models::update::<S, P>)
        .delete(models::delete::<S, P>),
    )
    .route("/models/{id}/archive", post(models::archive::<S, P>))
    .route("/models/{id}/restore", post(models::restore::<S, P>))
    // Views
    .route(
      "/models/{id}/views",
      get(views::list::<S, P>).post(views::create::<S, P>),
    )
    .route(
      "/models/{id}/views/default",
      get(views::get_default::<S, P>).put(views::set_default::<S, P>),
    )
    .route(
      "/models/{id}/views/{view_id}",
      put(views::update::<S, P>).delete(views::delete::<S, P>),
    )
    // Records
    .route(
      "/data/{model_id}",
      get(data::get::<S, P>)
        .post(data::create::<S, P>)
        .put(data::update::<S, P>)
        .delete(data::delete::<S, P>),
    )
    .route("/data/{model_id}/search", post(data::search::<S, P>))
    .route("/data/{model_id}/clear", post(data::clear::<S, P>))
    // Public (API-key) surface
    .route(
      "/public/data/{model_name}",
      get(public::get::<S, P>)
        .post(public::create::<S, P>)
        .put(public::update::<S, P>)
        .delete(public::delete::<S, P>),
    )
    .route("/public/data/{model_name}/search", post(public::search::<S, P>));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Assemble state from already-constructed parts — the binary and the tests
/// share this.
pub fn app_state<S, P>(
  store: S,
  provider: P,
  config: ServerConfig,
) -> AppState<S, P>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let policy = config.embedding_policy;
  AppState {
    store:      Arc::new(store),
    embeddings: Arc::new(EmbeddingService::new(provider, policy)),
    config:     Arc::new(config),
  }
}
