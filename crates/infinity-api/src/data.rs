//! Handlers for `/api/data/{model_id}` — record CRUD, similarity search,
//! and bulk clear, JWT-authenticated and owner-scoped.
//!
//! Record bodies are `{"fields": {...}}`. `GET` doubles as get-by-id
//! (`?id=...`) and paginated listing (`?filter=...&page=...&limit=...`,
//! filter being a JSON object in the query string).

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use infinity_core::{
  model::ModelDefinition,
  record::{FieldMap, ListQuery},
  store::PlatformStore,
  validate::validate,
};
use infinity_embed::{EmbeddingProvider, rank};

use crate::{ApiError, AppState, auth::AuthUser, resolve_owned_model, response};

/// Owner routes rank everything by default and let the caller raise the bar.
pub const OWNER_MIN_SIMILARITY: f32 = 0.0;

const DEFAULT_PAGE_LIMIT: u32 = 10;

// ─── Query / body types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct RecordQuery {
  pub id:     Option<Uuid>,
  /// JSON object, e.g. `filter={"status":"open"}`.
  pub filter: Option<String>,
  pub page:   Option<u32>,
  pub limit:  Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecordBody {
  pub fields: FieldMap,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
  pub query: String,
  #[serde(default)]
  pub limit: Option<usize>,
  #[serde(default, rename = "minSimilarity")]
  pub min_similarity: Option<f32>,
  #[serde(default)]
  pub filter: Option<FieldMap>,
}

pub(crate) fn parse_filter(raw: Option<&str>) -> Result<Option<FieldMap>, ApiError> {
  raw
    .map(|s| {
      serde_json::from_str::<FieldMap>(s)
        .map_err(|e| ApiError::validation(format!("invalid filter: {e}")))
    })
    .transpose()
}

pub(crate) fn clamp_paging<S, P>(
  state: &AppState<S, P>,
  query: &RecordQuery,
) -> (u32, u32) {
  let page = query.page.unwrap_or(1).max(1);
  let limit = query
    .limit
    .unwrap_or(DEFAULT_PAGE_LIMIT)
    .clamp(1, state.config.max_page_size);
  (page, limit)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /data/{model_id}` — one record by `?id=`, or a page of records.
pub async fn get<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Query(query): Query<RecordQuery>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;

  if let Some(id) = query.id {
    let record = state
      .store
      .get_record(model.id, id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::NotFound(format!("record {id} not found")))?;
    return Ok(response::ok(record).into_response());
  }

  let (page, limit) = clamp_paging(&state, &query);
  let list = ListQuery {
    filter: parse_filter(query.filter.as_deref())?,
    page,
    limit,
  };

  let result = state
    .store
    .list_records(model.id, &list)
    .await
    .map_err(ApiError::store)?;

  Ok(
    response::ok_with_meta(
      result.records,
      json!({ "page": page, "limit": limit, "total": result.total }),
    )
    .into_response(),
  )
}

/// `POST /data/{model_id}` — validate, embed when enabled, persist. 201.
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Json(body): Json<RecordBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;
  let record = write_record(&state, &model, None, body.fields).await?;
  Ok(response::created(record))
}

/// `PUT /data/{model_id}?id=...` — full replacement, re-validated.
pub async fn update<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Query(query): Query<RecordQuery>,
  Json(body): Json<RecordBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let id = query
    .id
    .ok_or_else(|| ApiError::validation("record id is required"))?;
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;
  let record = write_record(&state, &model, Some(id), body.fields).await?;
  Ok(response::ok(record))
}

/// `DELETE /data/{model_id}?id=...` — 204.
pub async fn delete<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Query(query): Query<RecordQuery>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let id = query
    .id
    .ok_or_else(|| ApiError::validation("record id is required"))?;
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;

  state
    .store
    .delete_record(model.id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /data/{model_id}/search` — cosine similarity over the model's
/// embedded records.
pub async fn search<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
  Json(body): Json<SearchBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;
  let hits = run_search(&state, &model, body, OWNER_MIN_SIMILARITY).await?;
  Ok(response::ok(hits))
}

/// `POST /data/{model_id}/clear` — bulk delete every record of the model.
pub async fn clear<S, P>(
  State(state): State<AppState<S, P>>,
  auth: AuthUser,
  Path(model_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_owned_model(&state, model_id, auth.user_id).await?;
  let deleted = state
    .store
    .clear_records(model.id)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(model = %model.id, deleted, "cleared records");
  Ok(response::ok(json!({ "deleted_count": deleted })))
}

// ─── Shared write / search paths ─────────────────────────────────────────────

/// The one write path: validate the full field set, derive the vector under
/// the configured policy, then insert or replace.
pub(crate) async fn write_record<S, P>(
  state: &AppState<S, P>,
  model: &ModelDefinition,
  id: Option<Uuid>,
  fields: FieldMap,
) -> Result<infinity_core::record::DataRecord, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  validate(model, &fields)?;

  let vector = state.embeddings.embed_for_write(model, &fields).await?;

  let record = match id {
    None => state
      .store
      .create_record(model.id, fields, vector)
      .await
      .map_err(ApiError::store)?,
    Some(id) => state
      .store
      .update_record(model.id, id, fields, vector)
      .await
      .map_err(ApiError::store)?,
  };

  Ok(record)
}

pub(crate) async fn run_search<S, P>(
  state: &AppState<S, P>,
  model: &ModelDefinition,
  body: SearchBody,
  default_min_similarity: f32,
) -> Result<Vec<infinity_core::record::ScoredRecord>, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  if !model.embedding_enabled() {
    return Err(ApiError::validation(
      "Vector search is not enabled for this model",
    ));
  }
  if body.query.trim().is_empty() {
    return Err(ApiError::validation("Search query is required"));
  }

  let limit = body.limit.unwrap_or(10);
  let min_similarity = body.min_similarity.unwrap_or(default_min_similarity);

  let query_vector = state.embeddings.embed_query(&body.query).await?;
  let candidates = state
    .store
    .search_candidates(model.id, body.filter.as_ref())
    .await
    .map_err(ApiError::store)?;

  Ok(rank(&query_vector, candidates, limit, min_similarity))
}
