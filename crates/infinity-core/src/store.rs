//! The `PlatformStore` trait — persistence abstraction for the platform.
//!
//! The trait is implemented by storage backends (e.g.
//! `infinity-store-sqlite`). The API layer depends on this abstraction, not
//! on any concrete backend.
//!
//! Stores assign identifiers and timestamps on create; callers validate
//! payloads *before* writing (see [`crate::validate`]), so the store itself
//! performs no schema checks.

use std::future::Future;

use uuid::Uuid;

use crate::{
  model::{ModelDefinition, ModelPatch, ModelStatus, NewModel},
  record::{DataRecord, FieldMap, ListQuery, RecordPage},
  user::{ApiKey, NewUser, SystemUser},
  view::{ModelView, NewView, ViewPatch},
};

/// Abstraction over an Infinity storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`). The associated
/// error must convert into the core taxonomy so callers can map failures to
/// client-facing statuses without knowing the backend.
pub trait PlatformStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Model definitions ─────────────────────────────────────────────────

  /// Persist a new model owned by `owner_id`. The input must already have
  /// passed [`NewModel::validate`]; name uniqueness is checked here.
  fn create_model(
    &self,
    owner_id: Uuid,
    input: NewModel,
  ) -> impl Future<Output = Result<ModelDefinition, Self::Error>> + Send + '_;

  /// Retrieve a model by id. Returns `None` if not found.
  fn get_model(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ModelDefinition>, Self::Error>> + Send + '_;

  /// Retrieve a model by (owner, name) — the public-API lookup path.
  fn get_model_by_name<'a>(
    &'a self,
    owner_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<ModelDefinition>, Self::Error>> + Send + 'a;

  /// All models owned by `owner_id`, newest first.
  fn list_models(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ModelDefinition>, Self::Error>> + Send + '_;

  /// Apply a partial update. Name-uniqueness is re-checked on rename.
  fn update_model(
    &self,
    id: Uuid,
    patch: ModelPatch,
  ) -> impl Future<Output = Result<ModelDefinition, Self::Error>> + Send + '_;

  /// Archive or restore (soft, reversible).
  fn set_model_status(
    &self,
    id: Uuid,
    status: ModelStatus,
  ) -> impl Future<Output = Result<ModelDefinition, Self::Error>> + Send + '_;

  /// Hard delete. Records are cleared independently; views cascade.
  fn delete_model(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Insert a record for `model_id` with a fresh id and timestamps.
  fn create_record(
    &self,
    model_id: Uuid,
    fields: FieldMap,
    vector: Option<Vec<f32>>,
  ) -> impl Future<Output = Result<DataRecord, Self::Error>> + Send + '_;

  /// Retrieve one record, scoped to its model. `None` when the id is
  /// missing or belongs to a different model.
  fn get_record(
    &self,
    model_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DataRecord>, Self::Error>> + Send + '_;

  /// Offset/limit listing with a total count ignoring pagination.
  fn list_records<'a>(
    &'a self,
    model_id: Uuid,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<RecordPage, Self::Error>> + Send + 'a;

  /// Replace the full field set (and vector) of a record. The caller
  /// re-validates the complete replacement set before calling.
  fn update_record(
    &self,
    model_id: Uuid,
    id: Uuid,
    fields: FieldMap,
    vector: Option<Vec<f32>>,
  ) -> impl Future<Output = Result<DataRecord, Self::Error>> + Send + '_;

  /// Hard delete one record; error when missing or foreign-model.
  fn delete_record(
    &self,
    model_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Bulk delete all records of a model; returns the deleted count.
  fn clear_records(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Overwrite just the stored vector. Idempotent; used to redrive
  /// embedding refreshes.
  fn set_record_vector<'a>(
    &'a self,
    model_id: Uuid,
    id: Uuid,
    vector: &'a [f32],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Model-scoped records that carry a vector, optionally narrowed by a
  /// field filter — the candidate set for similarity ranking.
  fn search_candidates<'a>(
    &'a self,
    model_id: Uuid,
    filter: Option<&'a FieldMap>,
  ) -> impl Future<Output = Result<Vec<DataRecord>, Self::Error>> + Send + 'a;

  // ── Views ─────────────────────────────────────────────────────────────

  /// Persist a new view. When `is_default` is set, any existing default in
  /// the (model, owner) scope is unset in the same transaction.
  fn create_view(
    &self,
    owner_id: Uuid,
    input: NewView,
  ) -> impl Future<Output = Result<ModelView, Self::Error>> + Send + '_;

  fn get_view(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ModelView>, Self::Error>> + Send + '_;

  /// The caller's own views plus public ones, newest first.
  fn list_views(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ModelView>, Self::Error>> + Send + '_;

  /// Owner-gated partial update; promoting to default swaps atomically.
  fn update_view(
    &self,
    id: Uuid,
    owner_id: Uuid,
    patch: ViewPatch,
  ) -> impl Future<Output = Result<ModelView, Self::Error>> + Send + '_;

  /// Owner-gated delete. Deleting the model's last view is rejected while
  /// it is the default.
  fn delete_view(
    &self,
    id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The caller's default view, falling back to the model's public
  /// default. `None` when neither exists (callers synthesize one).
  fn get_default_view(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<ModelView>, Self::Error>> + Send + '_;

  /// Transactional default swap: unset the (model, owner) default, then
  /// flag `view_id`. Zero rows on the second step rolls back and errors.
  fn set_default_view(
    &self,
    model_id: Uuid,
    owner_id: Uuid,
    view_id: Uuid,
  ) -> impl Future<Output = Result<ModelView, Self::Error>> + Send + '_;

  // ── Identity ──────────────────────────────────────────────────────────

  /// Register a user; errors when the username or email is taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<SystemUser, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SystemUser>, Self::Error>> + Send + '_;

  fn find_user_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<SystemUser>, Self::Error>> + Send + 'a;

  /// Persist a new key record; the plain key never reaches the store.
  fn create_api_key<'a>(
    &'a self,
    user_id: Uuid,
    name: &'a str,
    key_hash: &'a str,
  ) -> impl Future<Output = Result<ApiKey, Self::Error>> + Send + 'a;

  /// Resolve an *active* key by digest and touch its `last_used_at`.
  fn find_api_key_by_hash<'a>(
    &'a self,
    key_hash: &'a str,
  ) -> impl Future<Output = Result<Option<ApiKey>, Self::Error>> + Send + 'a;

  fn list_api_keys(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ApiKey>, Self::Error>> + Send + '_;

  /// Owner-gated delete; error when the key is missing or foreign.
  fn delete_api_key(
    &self,
    id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Token denylist ────────────────────────────────────────────────────

  /// Denylist a JWT by digest until it expires on its own.
  fn revoke_token<'a>(
    &'a self,
    token_hash: &'a str,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn is_token_revoked<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
