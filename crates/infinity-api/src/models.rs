//! Handlers for `/api/models` — model definition CRUD plus archive/restore.
//!
//! | Method   | Path                        | Notes |
//! |----------|-----------------------------|-------|
//! | `GET`    | `/models`                   | caller's models, newest first |
//! | `POST`   | `/models`                   | 201; name unique per owner |
//! | `GET`    | `/models/{id}`              | owner only |
//! | `PUT`    | `/models/{id}`              | partial update |
//! | `DELETE` | `/models/{id}`              | hard delete |
//! | `POST`   | `/models/{id}/archive`      | soft delete |
//! | `POST`   | `/models/{id}/restore`      | undo archive |

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use uuid::Uuid;

use infinity_core::{
  model::{ModelPatch, ModelStatus, NewModel},
  store::PlatformStore,
};
use infinity_embed::EmbeddingProvider;

use crate::{ApiError, AppState, auth::AuthUser, resolve_owned_model, response};

/// `GET /models`
pub async fn list<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let models = state
    .store
    .list_models(auth.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(models))
}

/// `POST /models`
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Json(input): Json<NewModel>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = state
    .store
    .create_model(auth.user_id, input)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(model = %model.id, owner = %auth.user_id, "created model");
  Ok(response::created(model))
}

/// `GET /models/{id}`
pub async fn get_one<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, id, auth.user_id).await?;
  Ok(response::ok(model))
}

/// `PUT /models/{id}`
pub async fn update<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<ModelPatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, id, auth.user_id).await?;

  let model = state
    .store
    .update_model(id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(model))
}

/// `DELETE /models/{id}` — hard delete; records are cleared separately.
pub async fn delete<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(&state, id, auth.user_id).await?;
  state.store.delete_model(id).await.map_err(ApiError::store)?;

  tracing::info!(model = %id, "deleted model");
  Ok(response::ok(serde_json::json!({ "deleted": true })))
}

/// `POST /models/{id}/archive`
pub async fn archive<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  set_status(&state, id, auth.user_id, ModelStatus::Archived).await
}

/// `POST /models/{id}/restore`
pub async fn restore<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  set_status(&state, id, auth.user_id, ModelStatus::Active).await
}

async fn set_status<S, P>(
  state: &AppState<S, P>,
  id: Uuid,
  user_id: Uuid,
  status: ModelStatus,
) -> Result<axum::Json<serde_json::Value>, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  resolve_owned_model(state, id, user_id).await?;
  let model = state
    .store
    .set_model_status(id, status)
    .await
    .map_err(ApiError::store)?;
  Ok(response::ok(model))
}
