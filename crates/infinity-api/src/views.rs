//! Handlers for `/api/models/{id}/views` — saved table configurations.
//!
//! `GET .../views/default` returns the caller's default view, falls back to
//! the model's public default, and synthesizes one from the model's fields
//! when neither exists. `PUT .../views/default` swaps the default flag
//! transactionally.

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use infinity_core::{
  store::PlatformStore,
  view::{NewView, ViewConfig, ViewPatch},
};
use infinity_embed::EmbeddingProvider;

use crate::{ApiError, AppState, auth::AuthUser, resolve_owned_model, response};

/// `GET /models/{id}/views`
pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, model_id, auth.user_id).await?;
  let views = state
    .store
    .list_views(model_id, auth.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(views))
}

#[derive(Debug, Deserialize)]
pub struct CreateViewBody {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  pub config:      ViewConfig,
  #[serde(default)]
  pub is_default:  bool,
  #[serde(default)]
  pub is_public:   bool,
}

/// `POST /models/{id}/views`
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Json(body): Json<CreateViewBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, model_id, auth.user_id).await?;

  if body.name.trim().is_empty() {
    return Err(ApiError::field_validation("name", "a view name is required"));
  }

  let view = state
    .store
    .create_view(auth.user_id, NewView {
      model_id,
      name: body.name,
      description: body.description,
      config: body.config,
      is_default: body.is_default,
      is_public: body.is_public,
    })
    .await
    .map_err(ApiError::store)?;

  Ok(response::created(view))
}

/// `PUT /models/{id}/views/{view_id}`
pub async fn update<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path((model_id, view_id)): Path<(Uuid, Uuid)>,
  Json(patch): Json<ViewPatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, model_id, auth.user_id).await?;
  let view = state
    .store
    .update_view(view_id, auth.user_id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(view))
}

/// `DELETE /models/{id}/views/{view_id}`
pub async fn delete<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path((model_id, view_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, model_id, auth.user_id).await?;
  state
    .store
    .delete_view(view_id, auth.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(serde_json::json!({ "deleted": true })))
}

/// `GET /models/{id}/views/default` — return-or-create.
pub async fn get_default<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;

  if let Some(view) = state
    .store
    .get_default_view(model_id, auth.user_id)
    .await
    .map_err(ApiError::store)?
  {
    return Ok(response::ok(view));
  }

  // Nothing saved yet: derive columns 1:1 from the model's fields and
  // persist the result as the caller's default.
  let synthesized = state
    .store
    .create_view(auth.user_id, NewView {
      model_id,
      name: "Default View".to_string(),
      description: Some("Auto-generated default view".to_string()),
      config: ViewConfig::default_for(&model),
      is_default: true,
      is_public: false,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(model = %model_id, user = %auth.user_id, "synthesized default view");
  Ok(response::ok(synthesized))
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultBody {
  #[serde(rename = "viewId")]
  pub view_id: Uuid,
}

/// `PUT /models/{id}/views/default` — transactional swap; zero rows on the
/// target view means not-found and rolls the unset back.
pub async fn set_default<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Json(body): Json<SetDefaultBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, model_id, auth.user_id).await?;
  let view = state
    .store
    .set_default_view(model_id, auth.user_id, body.view_id)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(view))
}
