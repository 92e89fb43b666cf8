//! [`SqliteStore`] — the SQLite implementation of [`PlatformStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value as SqlValue};
use serde_json::Value;
use uuid::Uuid;

use infinity_core::{
  model::{ModelDefinition, ModelPatch, ModelStatus, NewModel},
  record::{DataRecord, FieldMap, ListQuery, RecordPage},
  store::PlatformStore,
  user::{ApiKey, ApiKeyStatus, NewUser, SystemUser, UserStatus},
  view::{ModelView, NewView, ViewPatch},
};

use crate::{
  Error, Result,
  encode::{
    RawApiKey, RawModel, RawRecord, RawUser, RawView, encode_api_key_status,
    encode_dt, encode_fields, encode_json, encode_model_status,
    encode_user_status, encode_uuid, encode_vector,
  },
  schema::SCHEMA,
};

// ─── Column lists and row mappers ────────────────────────────────────────────

const MODEL_COLS: &str = "id, owner_id, name, description, fields_json, \
   relationships_json, indexes_json, embedding_json, status, created_at, \
   updated_at";

const VIEW_COLS: &str = "id, model_id, owner_id, name, description, \
   config_json, is_default, is_public, created_at, updated_at";

const USER_COLS: &str =
  "id, username, email, name, status, password_hash, created_at, updated_at";

const API_KEY_COLS: &str = "id, user_id, key_hash, name, status, \
   last_used_at, created_at, updated_at";

fn model_from_row(r: &rusqlite::Row) -> rusqlite::Result<RawModel> {
  Ok(RawModel {
    id:                 r.get(0)?,
    owner_id:           r.get(1)?,
    name:               r.get(2)?,
    description:        r.get(3)?,
    fields_json:        r.get(4)?,
    relationships_json: r.get(5)?,
    indexes_json:       r.get(6)?,
    embedding_json:     r.get(7)?,
    status:             r.get(8)?,
    created_at:         r.get(9)?,
    updated_at:         r.get(10)?,
  })
}

fn view_from_row(r: &rusqlite::Row) -> rusqlite::Result<RawView> {
  Ok(RawView {
    id:          r.get(0)?,
    model_id:    r.get(1)?,
    owner_id:    r.get(2)?,
    name:        r.get(3)?,
    description: r.get(4)?,
    config_json: r.get(5)?,
    is_default:  r.get(6)?,
    is_public:   r.get(7)?,
    created_at:  r.get(8)?,
    updated_at:  r.get(9)?,
  })
}

fn user_from_row(r: &rusqlite::Row) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    id:            r.get(0)?,
    username:      r.get(1)?,
    email:         r.get(2)?,
    name:          r.get(3)?,
    status:        r.get(4)?,
    password_hash: r.get(5)?,
    created_at:    r.get(6)?,
    updated_at:    r.get(7)?,
  })
}

fn api_key_from_row(r: &rusqlite::Row) -> rusqlite::Result<RawApiKey> {
  Ok(RawApiKey {
    id:           r.get(0)?,
    user_id:      r.get(1)?,
    key_hash:     r.get(2)?,
    name:         r.get(3)?,
    status:       r.get(4)?,
    last_used_at: r.get(5)?,
    created_at:   r.get(6)?,
    updated_at:   r.get(7)?,
  })
}

fn record_from_row(r: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    record_id:   r.get(0)?,
    fields_json: r.get(1)?,
    vector_json: r.get(2)?,
    created_at:  r.get(3)?,
    updated_at:  r.get(4)?,
  })
}

// ─── Filter compilation ──────────────────────────────────────────────────────

/// Compile a record filter into `AND ...` SQL fragments plus bound values.
///
/// `_id` matches the record identifier; every other key matches the stored
/// field value via `json_extract`. The JSON path is bound as a parameter so
/// field names never splice into the SQL text.
fn compile_filter(filter: Option<&FieldMap>) -> (String, Vec<SqlValue>) {
  let mut sql = String::new();
  let mut values = Vec::new();

  let Some(filter) = filter else {
    return (sql, values);
  };

  for (key, value) in filter {
    if key == "_id" {
      sql.push_str(" AND record_id = ?");
      values.push(SqlValue::Text(match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
      }));
    } else if value.is_null() {
      sql.push_str(" AND json_extract(fields_json, ?) IS NULL");
      values.push(SqlValue::Text(format!("$.{key}")));
    } else {
      sql.push_str(" AND json_extract(fields_json, ?) = ?");
      values.push(SqlValue::Text(format!("$.{key}")));
      values.push(json_to_sql(value));
    }
  }

  (sql, values)
}

/// How a JSON value compares against what `json_extract` yields.
fn json_to_sql(value: &Value) -> SqlValue {
  match value {
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or_default()),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    other => SqlValue::Text(other.to_string()),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Infinity platform store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one view row by id, without owner gating.
  async fn fetch_view(&self, id: Uuid) -> Result<Option<ModelView>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {VIEW_COLS} FROM model_views WHERE id = ?1"),
            params![id_str],
            view_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawView::into_view).transpose()
  }
}

impl PlatformStore for SqliteStore {
  type Error = Error;

  // ── Model definitions ─────────────────────────────────────────────────

  async fn create_model(
    &self,
    owner_id: Uuid,
    input: NewModel,
  ) -> Result<ModelDefinition> {
    input.validate()?;

    let now = Utc::now();
    let model = ModelDefinition {
      id: Uuid::new_v4(),
      owner_id,
      name: input.name,
      description: input.description,
      fields: input.fields,
      relationships: input.relationships,
      indexes: input.indexes,
      embedding: input.embedding,
      status: ModelStatus::Active,
      created_at: now,
      updated_at: now,
    };

    let id_str        = encode_uuid(model.id);
    let owner_str     = encode_uuid(owner_id);
    let name          = model.name.clone();
    let description   = model.description.clone();
    let fields_json   = encode_json(&model.fields)?;
    let rels_json     = model.relationships.as_ref().map(encode_json).transpose()?;
    let indexes_json  = model.indexes.as_ref().map(encode_json).transpose()?;
    let embed_json    = model.embedding.as_ref().map(encode_json).transpose()?;
    let status_str    = encode_model_status(model.status).to_owned();
    let now_str       = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        let taken: bool = conn
          .query_row(
            "SELECT 1 FROM model_definitions WHERE owner_id = ?1 AND name = ?2",
            params![owner_str, name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if taken {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO model_definitions (
             id, owner_id, name, description, fields_json, relationships_json,
             indexes_json, embedding_json, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          params![
            id_str, owner_str, name, description, fields_json, rels_json,
            indexes_json, embed_json, status_str, now_str, now_str
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::Core(infinity_core::Error::ModelNameTaken(
        model.name.clone(),
      )));
    }

    Ok(model)
  }

  async fn get_model(&self, id: Uuid) -> Result<Option<ModelDefinition>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {MODEL_COLS} FROM model_definitions WHERE id = ?1"),
            params![id_str],
            model_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawModel::into_model).transpose()
  }

  async fn get_model_by_name(
    &self,
    owner_id: Uuid,
    name: &str,
  ) -> Result<Option<ModelDefinition>> {
    let owner_str = encode_uuid(owner_id);
    let name = name.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT {MODEL_COLS} FROM model_definitions \
               WHERE owner_id = ?1 AND name = ?2"
            ),
            params![owner_str, name],
            model_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawModel::into_model).transpose()
  }

  async fn list_models(&self, owner_id: Uuid) -> Result<Vec<ModelDefinition>> {
    let owner_str = encode_uuid(owner_id);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MODEL_COLS} FROM model_definitions \
           WHERE owner_id = ?1 ORDER BY created_at DESC"
        ))?;
        let raws = stmt
          .query_map(params![owner_str], model_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;
    raws.into_iter().map(RawModel::into_model).collect()
  }

  async fn update_model(
    &self,
    id: Uuid,
    patch: ModelPatch,
  ) -> Result<ModelDefinition> {
    let existing = self
      .get_model(id)
      .await?
      .ok_or(infinity_core::Error::ModelNotFound(id))?;

    let renamed = patch.name.as_ref().is_some_and(|n| *n != existing.name);

    let updated = ModelDefinition {
      name:          patch.name.unwrap_or(existing.name),
      description:   patch.description.or(existing.description),
      fields:        patch.fields.unwrap_or(existing.fields),
      relationships: patch.relationships.or(existing.relationships),
      indexes:       patch.indexes.or(existing.indexes),
      embedding:     patch.embedding.or(existing.embedding),
      updated_at:    Utc::now(),
      ..existing
    };

    // Re-validate the merged definition the same way creation does.
    NewModel {
      name:          updated.name.clone(),
      description:   updated.description.clone(),
      fields:        updated.fields.clone(),
      relationships: updated.relationships.clone(),
      indexes:       updated.indexes.clone(),
      embedding:     updated.embedding.clone(),
    }
    .validate()?;

    let id_str       = encode_uuid(id);
    let owner_str    = encode_uuid(updated.owner_id);
    let name         = updated.name.clone();
    let description  = updated.description.clone();
    let fields_json  = encode_json(&updated.fields)?;
    let rels_json    = updated.relationships.as_ref().map(encode_json).transpose()?;
    let indexes_json = updated.indexes.as_ref().map(encode_json).transpose()?;
    let embed_json   = updated.embedding.as_ref().map(encode_json).transpose()?;
    let updated_str  = encode_dt(updated.updated_at);

    let committed = self
      .conn
      .call(move |conn| {
        if renamed {
          let taken: bool = conn
            .query_row(
              "SELECT 1 FROM model_definitions \
               WHERE owner_id = ?1 AND name = ?2 AND id != ?3",
              params![owner_str, name, id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if taken {
            return Ok(false);
          }
        }

        conn.execute(
          "UPDATE model_definitions SET
             name = ?2, description = ?3, fields_json = ?4,
             relationships_json = ?5, indexes_json = ?6, embedding_json = ?7,
             updated_at = ?8
           WHERE id = ?1",
          params![
            id_str, name, description, fields_json, rels_json, indexes_json,
            embed_json, updated_str
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !committed {
      return Err(Error::Core(infinity_core::Error::ModelNameTaken(
        updated.name.clone(),
      )));
    }

    Ok(updated)
  }

  async fn set_model_status(
    &self,
    id: Uuid,
    status: ModelStatus,
  ) -> Result<ModelDefinition> {
    let id_str     = encode_uuid(id);
    let status_str = encode_model_status(status).to_owned();
    let now_str    = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE model_definitions SET status = ?2, updated_at = ?3 \
           WHERE id = ?1",
          params![id_str, status_str, now_str],
        )?;
        Ok(n)
      })
      .await?;

    if changed == 0 {
      return Err(Error::Core(infinity_core::Error::ModelNotFound(id)));
    }

    self
      .get_model(id)
      .await?
      .ok_or_else(|| Error::Core(infinity_core::Error::ModelNotFound(id)))
  }

  async fn delete_model(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        let n =
          conn.execute("DELETE FROM model_definitions WHERE id = ?1", params![
            id_str
          ])?;
        Ok(n)
      })
      .await?;

    if n == 0 {
      return Err(Error::Core(infinity_core::Error::ModelNotFound(id)));
    }
    Ok(())
  }

  // ── Records ───────────────────────────────────────────────────────────

  async fn create_record(
    &self,
    model_id: Uuid,
    fields: FieldMap,
    vector: Option<Vec<f32>>,
  ) -> Result<DataRecord> {
    let now = Utc::now();
    let record = DataRecord {
      record_id: Uuid::new_v4(),
      fields,
      created_at: now,
      updated_at: now,
      vector,
    };

    let id_str      = encode_uuid(record.record_id);
    let model_str   = encode_uuid(model_id);
    let fields_json = encode_fields(&record.fields)?;
    let vector_json = record.vector.as_deref().map(encode_vector).transpose()?;
    let now_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO data_records (
             record_id, model_id, fields_json, vector_json, created_at,
             updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id_str, model_str, fields_json, vector_json, now_str, now_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn get_record(
    &self,
    model_id: Uuid,
    id: Uuid,
  ) -> Result<Option<DataRecord>> {
    let id_str    = encode_uuid(id);
    let model_str = encode_uuid(model_id);
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            "SELECT record_id, fields_json, NULL, created_at, updated_at \
             FROM data_records WHERE record_id = ?1 AND model_id = ?2",
            params![id_str, model_str],
            record_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawRecord::into_projected).transpose()
  }

  async fn list_records(
    &self,
    model_id: Uuid,
    query: &ListQuery,
  ) -> Result<RecordPage> {
    let model_str = encode_uuid(model_id);
    let (filter_sql, filter_values) = compile_filter(query.filter.as_ref());

    let page   = query.page.max(1);
    let limit  = query.limit.max(1);
    let offset = i64::from(page - 1) * i64::from(limit);

    let count_sql = format!(
      "SELECT COUNT(*) FROM data_records WHERE model_id = ?{filter_sql}"
    );
    let select_sql = format!(
      "SELECT record_id, fields_json, NULL, created_at, updated_at \
       FROM data_records WHERE model_id = ?{filter_sql} \
       ORDER BY created_at, record_id LIMIT ? OFFSET ?"
    );

    let (total, raws) = self
      .conn
      .call(move |conn| {
        let mut count_params = vec![SqlValue::Text(model_str.clone())];
        count_params.extend(filter_values.iter().cloned());

        let total: i64 = conn.query_row(
          &count_sql,
          params_from_iter(count_params.iter()),
          |r| r.get(0),
        )?;

        let mut select_params = count_params;
        select_params.push(SqlValue::Integer(i64::from(limit)));
        select_params.push(SqlValue::Integer(offset));

        let mut stmt = conn.prepare(&select_sql)?;
        let raws = stmt
          .query_map(params_from_iter(select_params.iter()), record_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, raws))
      })
      .await?;

    Ok(RecordPage {
      records: raws
        .into_iter()
        .map(RawRecord::into_projected)
        .collect::<Result<_>>()?,
      total:   total as u64,
    })
  }

  async fn update_record(
    &self,
    model_id: Uuid,
    id: Uuid,
    fields: FieldMap,
    vector: Option<Vec<f32>>,
  ) -> Result<DataRecord> {
    let id_str      = encode_uuid(id);
    let model_str   = encode_uuid(model_id);
    let fields_json = encode_fields(&fields)?;
    let vector_json = vector.as_deref().map(encode_vector).transpose()?;
    let now         = Utc::now();
    let now_str     = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE data_records SET fields_json = ?3, vector_json = ?4, \
           updated_at = ?5 WHERE record_id = ?1 AND model_id = ?2",
          params![id_str, model_str, fields_json, vector_json, now_str],
        )?;
        if n == 0 {
          return Ok(None);
        }
        let raw = conn.query_row(
          "SELECT record_id, fields_json, NULL, created_at, updated_at \
           FROM data_records WHERE record_id = ?1",
          params![id_str],
          record_from_row,
        )?;
        Ok(Some(raw))
      })
      .await?;

    match raw {
      Some(raw) => raw.into_projected(),
      None => Err(Error::Core(infinity_core::Error::RecordNotFound(id))),
    }
  }

  async fn delete_record(&self, model_id: Uuid, id: Uuid) -> Result<()> {
    let id_str    = encode_uuid(id);
    let model_str = encode_uuid(model_id);
    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM data_records WHERE record_id = ?1 AND model_id = ?2",
          params![id_str, model_str],
        )?;
        Ok(n)
      })
      .await?;

    if n == 0 {
      return Err(Error::Core(infinity_core::Error::RecordNotFound(id)));
    }
    Ok(())
  }

  async fn clear_records(&self, model_id: Uuid) -> Result<u64> {
    let model_str = encode_uuid(model_id);
    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute("DELETE FROM data_records WHERE model_id = ?1", params![
          model_str
        ])?;
        Ok(n)
      })
      .await?;
    Ok(n as u64)
  }

  async fn set_record_vector(
    &self,
    model_id: Uuid,
    id: Uuid,
    vector: &[f32],
  ) -> Result<()> {
    let id_str      = encode_uuid(id);
    let model_str   = encode_uuid(model_id);
    let vector_json = encode_vector(vector)?;
    let now_str     = encode_dt(Utc::now());

    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE data_records SET vector_json = ?3, updated_at = ?4 \
           WHERE record_id = ?1 AND model_id = ?2",
          params![id_str, model_str, vector_json, now_str],
        )?;
        Ok(n)
      })
      .await?;

    if n == 0 {
      return Err(Error::Core(infinity_core::Error::RecordNotFound(id)));
    }
    Ok(())
  }

  async fn search_candidates(
    &self,
    model_id: Uuid,
    filter: Option<&FieldMap>,
  ) -> Result<Vec<DataRecord>> {
    let model_str = encode_uuid(model_id);
    let (filter_sql, filter_values) = compile_filter(filter);
    let sql = format!(
      "SELECT record_id, fields_json, vector_json, created_at, updated_at \
       FROM data_records \
       WHERE model_id = ? AND vector_json IS NOT NULL{filter_sql}"
    );

    let raws = self
      .conn
      .call(move |conn| {
        let mut bound = vec![SqlValue::Text(model_str)];
        bound.extend(filter_values);

        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params_from_iter(bound.iter()), record_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Views ─────────────────────────────────────────────────────────────

  async fn create_view(&self, owner_id: Uuid, input: NewView) -> Result<ModelView> {
    let now = Utc::now();
    let view = ModelView {
      id:          Uuid::new_v4(),
      model_id:    input.model_id,
      owner_id,
      name:        input.name,
      description: input.description,
      config:      input.config,
      is_default:  input.is_default,
      is_public:   input.is_public,
      created_at:  now,
      updated_at:  now,
    };

    let id_str      = encode_uuid(view.id);
    let model_str   = encode_uuid(view.model_id);
    let owner_str   = encode_uuid(owner_id);
    let name        = view.name.clone();
    let description = view.description.clone();
    let config_json = encode_json(&view.config)?;
    let is_default  = view.is_default;
    let is_public   = view.is_public;
    let now_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if is_default {
          tx.execute(
            "UPDATE model_views SET is_default = 0 \
             WHERE model_id = ?1 AND owner_id = ?2 AND is_default = 1",
            params![model_str, owner_str],
          )?;
        }
        tx.execute(
          "INSERT INTO model_views (
             id, model_id, owner_id, name, description, config_json,
             is_default, is_public, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          params![
            id_str, model_str, owner_str, name, description, config_json,
            is_default, is_public, now_str, now_str
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(view)
  }

  async fn get_view(&self, id: Uuid) -> Result<Option<ModelView>> {
    self.fetch_view(id).await
  }

  async fn list_views(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
  ) -> Result<Vec<ModelView>> {
    let model_str = encode_uuid(model_id);
    let owner_str = encode_uuid(owner_id);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VIEW_COLS} FROM model_views \
           WHERE model_id = ?1 AND (owner_id = ?2 OR is_public = 1) \
           ORDER BY created_at DESC"
        ))?;
        let raws = stmt
          .query_map(params![model_str, owner_str], view_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;
    raws.into_iter().map(RawView::into_view).collect()
  }

  async fn update_view(
    &self,
    id: Uuid,
    owner_id: Uuid,
    patch: ViewPatch,
  ) -> Result<ModelView> {
    let existing = self
      .fetch_view(id)
      .await?
      .ok_or(infinity_core::Error::ViewNotFound(id))?;

    if existing.owner_id != owner_id {
      return Err(Error::Core(infinity_core::Error::NotOwner));
    }

    let promoting = patch.is_default == Some(true) && !existing.is_default;
    let updated = ModelView {
      name:        patch.name.unwrap_or(existing.name),
      description: patch.description.or(existing.description),
      config:      patch.config.unwrap_or(existing.config),
      is_default:  patch.is_default.unwrap_or(existing.is_default),
      is_public:   patch.is_public.unwrap_or(existing.is_public),
      updated_at:  Utc::now(),
      ..existing
    };

    let id_str      = encode_uuid(id);
    let model_str   = encode_uuid(updated.model_id);
    let owner_str   = encode_uuid(owner_id);
    let name        = updated.name.clone();
    let description = updated.description.clone();
    let config_json = encode_json(&updated.config)?;
    let is_default  = updated.is_default;
    let is_public   = updated.is_public;
    let updated_str = encode_dt(updated.updated_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if promoting {
          tx.execute(
            "UPDATE model_views SET is_default = 0 \
             WHERE model_id = ?1 AND owner_id = ?2 AND is_default = 1",
            params![model_str, owner_str],
          )?;
        }
        tx.execute(
          "UPDATE model_views SET
             name = ?2, description = ?3, config_json = ?4, is_default = ?5,
             is_public = ?6, updated_at = ?7
           WHERE id = ?1",
          params![
            id_str, name, description, config_json, is_default, is_public,
            updated_str
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(updated)
  }

  async fn delete_view(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
    let existing = self
      .fetch_view(id)
      .await?
      .ok_or(infinity_core::Error::ViewNotFound(id))?;

    if existing.owner_id != owner_id {
      return Err(Error::Core(infinity_core::Error::NotOwner));
    }

    let id_str    = encode_uuid(id);
    let model_str = encode_uuid(existing.model_id);
    let owner_str = encode_uuid(owner_id);
    let guard_last = existing.is_default;

    let deleted = self
      .conn
      .call(move |conn| {
        if guard_last {
          let visible: i64 = conn.query_row(
            "SELECT COUNT(*) FROM model_views \
             WHERE model_id = ?1 AND (owner_id = ?2 OR is_public = 1)",
            params![model_str, owner_str],
            |r| r.get(0),
          )?;
          if visible <= 1 {
            return Ok(false);
          }
        }
        conn.execute(
          "DELETE FROM model_views WHERE id = ?1 AND owner_id = ?2",
          params![id_str, owner_str],
        )?;
        Ok(true)
      })
      .await?;

    if !deleted {
      return Err(Error::Core(infinity_core::Error::LastView));
    }
    Ok(())
  }

  async fn get_default_view(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
  ) -> Result<Option<ModelView>> {
    let model_str = encode_uuid(model_id);
    let owner_str = encode_uuid(owner_id);

    let raw = self
      .conn
      .call(move |conn| {
        let own = conn
          .query_row(
            &format!(
              "SELECT {VIEW_COLS} FROM model_views \
               WHERE model_id = ?1 AND owner_id = ?2 AND is_default = 1 \
               LIMIT 1"
            ),
            params![model_str, owner_str],
            view_from_row,
          )
          .optional()?;

        if own.is_some() {
          return Ok(own);
        }

        let public = conn
          .query_row(
            &format!(
              "SELECT {VIEW_COLS} FROM model_views \
               WHERE model_id = ?1 AND is_public = 1 AND is_default = 1 \
               LIMIT 1"
            ),
            params![model_str],
            view_from_row,
          )
          .optional()?;
        Ok(public)
      })
      .await?;

    raw.map(RawView::into_view).transpose()
  }

  async fn set_default_view(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
    view_id: Uuid,
  ) -> Result<ModelView> {
    let model_str = encode_uuid(model_id);
    let owner_str = encode_uuid(owner_id);
    let view_str  = encode_uuid(view_id);
    let now_str   = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "UPDATE model_views SET is_default = 0 \
           WHERE model_id = ?1 AND owner_id = ?2 AND is_default = 1",
          params![model_str, owner_str],
        )?;

        let n = tx.execute(
          "UPDATE model_views SET is_default = 1, updated_at = ?4 \
           WHERE id = ?1 AND model_id = ?2 AND owner_id = ?3",
          params![view_str, model_str, owner_str, now_str],
        )?;

        // Zero rows means the view is missing or out of scope: dropping the
        // transaction uncommitted rolls the unset back too.
        if n == 0 {
          return Ok(None);
        }

        let raw = tx.query_row(
          &format!("SELECT {VIEW_COLS} FROM model_views WHERE id = ?1"),
          params![view_str],
          view_from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    match raw {
      Some(raw) => Ok(raw.into_view()?),
      None => Err(Error::Core(infinity_core::Error::ViewNotFound(view_id))),
    }
  }

  // ── Identity ──────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<SystemUser> {
    let now = Utc::now();
    let user = SystemUser {
      id:            Uuid::new_v4(),
      username:      input.username,
      email:         input.email,
      name:          input.name,
      status:        UserStatus::Active,
      password_hash: input.password_hash,
      created_at:    now,
      updated_at:    now,
    };

    let id_str     = encode_uuid(user.id);
    let username   = user.username.clone();
    let email      = user.email.clone();
    let name       = user.name.clone();
    let status_str = encode_user_status(user.status).to_owned();
    let hash       = user.password_hash.clone();
    let now_str    = encode_dt(now);

    let inserted = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1 OR username = ?2",
            params![email, username],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if exists {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO users (
             id, username, email, name, status, password_hash, created_at,
             updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![id_str, username, email, name, status_str, hash, now_str, now_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::Core(infinity_core::Error::UserExists));
    }

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<SystemUser>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
            params![id_str],
            user_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_username(
    &self,
    username: &str,
  ) -> Result<Option<SystemUser>> {
    let username = username.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn create_api_key(
    &self,
    user_id: Uuid,
    name: &str,
    key_hash: &str,
  ) -> Result<ApiKey> {
    let now = Utc::now();
    let key = ApiKey {
      id:           Uuid::new_v4(),
      user_id,
      key_hash:     key_hash.to_owned(),
      name:         name.to_owned(),
      status:       ApiKeyStatus::Active,
      last_used_at: None,
      created_at:   now,
      updated_at:   now,
    };

    let id_str     = encode_uuid(key.id);
    let user_str   = encode_uuid(user_id);
    let hash       = key.key_hash.clone();
    let name       = key.name.clone();
    let status_str = encode_api_key_status(key.status).to_owned();
    let now_str    = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO api_keys (
             id, user_id, key_hash, name, status, last_used_at, created_at,
             updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
          params![id_str, user_str, hash, name, status_str, now_str, now_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(key)
  }

  async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
    let hash    = key_hash.to_owned();
    let now     = Utc::now();
    let now_str = encode_dt(now);

    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT {API_KEY_COLS} FROM api_keys \
               WHERE key_hash = ?1 AND status = 'active'"
            ),
            params![hash],
            api_key_from_row,
          )
          .optional()?;

        if let Some(raw) = &raw {
          conn.execute(
            "UPDATE api_keys SET last_used_at = ?2 WHERE id = ?1",
            params![raw.id, now_str],
          )?;
        }
        Ok(raw)
      })
      .await?;

    match raw {
      Some(raw) => {
        let mut key = raw.into_api_key()?;
        key.last_used_at = Some(now);
        Ok(Some(key))
      }
      None => Ok(None),
    }
  }

  async fn list_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>> {
    let user_str = encode_uuid(user_id);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {API_KEY_COLS} FROM api_keys \
           WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let raws = stmt
          .query_map(params![user_str], api_key_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(raws)
      })
      .await?;
    raws.into_iter().map(RawApiKey::into_api_key).collect()
  }

  async fn delete_api_key(&self, id: Uuid, user_id: Uuid) -> Result<()> {
    let id_str   = encode_uuid(id);
    let user_str = encode_uuid(user_id);
    let n = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM api_keys WHERE id = ?1 AND user_id = ?2",
          params![id_str, user_str],
        )?;
        Ok(n)
      })
      .await?;

    if n == 0 {
      return Err(Error::Core(infinity_core::Error::ApiKeyNotFound(id)));
    }
    Ok(())
  }

  // ── Token denylist ────────────────────────────────────────────────────

  async fn revoke_token(&self, token_hash: &str, user_id: Uuid) -> Result<()> {
    let hash     = token_hash.to_owned();
    let user_str = encode_uuid(user_id);
    let now_str  = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO revoked_tokens (token_hash, user_id, revoked_at) \
           VALUES (?1, ?2, ?3)",
          params![hash, user_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_token_revoked(&self, token_hash: &str) -> Result<bool> {
    let hash = token_hash.to_owned();
    let revoked = self
      .conn
      .call(move |conn| {
        let found: bool = conn
          .query_row(
            "SELECT 1 FROM revoked_tokens WHERE token_hash = ?1",
            params![hash],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        Ok(found)
      })
      .await?;
    Ok(revoked)
  }
}
