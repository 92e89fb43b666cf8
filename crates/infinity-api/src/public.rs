//! Handlers for `/api/public/data/{model_name}` — the API-key surface.
//!
//! Models are addressed by name within the key owner's namespace. Record
//! bodies are bare field objects (no `fields` wrapper), and `POST` accepts
//! either one object or an array; bulk inserts report per-item outcomes with
//! HTTP 207 on partial failure.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde_json::{Value, json};

use infinity_core::{model::ModelDefinition, record::ListQuery, store::PlatformStore};
use infinity_embed::EmbeddingProvider;

use crate::{
  ApiError, AppState,
  auth::ApiKeyUser,
  data::{RecordQuery, SearchBody, clamp_paging, parse_filter, run_search, write_record},
  response,
};

/// Public search filters aggressively by default (the owner surface ranks
/// everything); callers can lower the bar per request.
pub const PUBLIC_MIN_SIMILARITY: f32 = 0.7;

async fn resolve_named_model<S, P>(
  state: &AppState<S, P>,
  user_id: uuid::Uuid,
  name: &str,
) -> Result<ModelDefinition, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  state
    .store
    .get_model_by_name(user_id, name)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::store(infinity_core::Error::ModelNameNotFound(name.to_owned()))
    })
}

fn as_fields(value: Value) -> Result<infinity_core::record::FieldMap, ApiError> {
  match value {
    Value::Object(map) => Ok(map),
    _ => Err(ApiError::validation("record body must be a JSON object")),
  }
}

/// `GET /public/data/{model_name}` — get-by-id or paginated list with the
/// extended public meta block.
pub async fn get<S, P>(
  State(state): State<AppState<S, P>>,
  key: ApiKeyUser,
  Path(model_name): Path<String>,
  Query(query): Query<RecordQuery>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_named_model(&state, key.user_id, &model_name).await?;

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

  let total_pages = result.total.div_ceil(u64::from(limit));
  Ok(
    response::ok_with_meta(
      result.records,
      json!({
        "page": page,
        "limit": limit,
        "total": result.total,
        "total_pages": total_pages,
        "has_next_page": u64::from(page) < total_pages,
        "has_previous_page": page > 1,
      }),
    )
    .into_response(),
  )
}

/// `POST /public/data/{model_name}` — single object or bulk array.
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  key: ApiKeyUser,
  Path(model_name): Path<String>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_named_model(&state, key.user_id, &model_name).await?;

  let Value::Array(items) = body else {
    let record = write_record(&state, &model, None, as_fields(body)?).await?;
    return Ok(response::created(record).into_response());
  };

  if items.is_empty() {
    return Err(ApiError::validation(
      "Empty array provided. At least one record is required.",
    ));
  }

  let mut results = Vec::new();
  let mut errors = Vec::new();

  for (index, item) in items.into_iter().enumerate() {
    let outcome = match as_fields(item.clone()) {
      Ok(fields) => write_record(&state, &model, None, fields).await,
      Err(err) => Err(err),
    };
    match outcome {
      Ok(record) => results.push(record),
      Err(err) => errors.push(json!({
        "index": index,
        "error": err.to_string(),
        "data": item,
      })),
    }
  }

  let status = if errors.is_empty() {
    StatusCode::CREATED
  } else {
    StatusCode::MULTI_STATUS
  };

  Ok(
    (
      status,
      Json(json!({
        "success": errors.is_empty(),
        "data": results,
        "errors": errors,
      })),
    )
      .into_response(),
  )
}

/// `PUT /public/data/{model_name}?id=...`
pub async fn update<S, P>(
  State(state): State<AppState<S, P>>,
  key: ApiKeyUser,
  Path(model_name): Path<String>,
  Query(query): Query<RecordQuery>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let id = query
    .id
    .ok_or_else(|| ApiError::validation("record id is required"))?;
  let model = resolve_named_model(&state, key.user_id, &model_name).await?;
  let record = write_record(&state, &model, Some(id), as_fields(body)?).await?;
  Ok(response::ok(record))
}

/// `DELETE /public/data/{model_name}?id=...` — 204.
pub async fn delete<S, P>(
  State(state): State<AppState<S, P>>,
  key: ApiKeyUser,
  Path(model_name): Path<String>,
  Query(query): Query<RecordQuery>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let id = query
    .id
    .ok_or_else(|| ApiError::validation("record id is required"))?;
  let model = resolve_named_model(&state, key.user_id, &model_name).await?;

  state
    .store
    .delete_record(model.id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /public/data/{model_name}/search`
pub async fn search<S, P>(
  State(state): State<AppState<S, P>>,
  key: ApiKeyUser,
  Path(model_name): Path<String>,
  Json(body): Json<SearchBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PlatformStore,
  P: EmbeddingProvider,
{
  let model = resolve_named_model(&state, key.user_id, &model_name).await?;
  let hits = run_search(&state, &model, body, PUBLIC_MIN_SIMILARITY).await?;
  Ok(response::ok(hits))
}
