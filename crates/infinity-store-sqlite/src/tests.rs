//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use infinity_core::{
  model::{
    EmbeddingConfig, FieldDefinition, FieldType, ModelPatch, ModelStatus,
    NewModel,
  },
  record::{FieldMap, ListQuery},
  store::PlatformStore,
  user::NewUser,
  view::{ModelView, NewView, ViewConfig, ViewPatch},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn field(field_type: FieldType, required: bool) -> FieldDefinition {
  FieldDefinition {
    id: Uuid::new_v4(),
    field_type,
    required,
    unique: false,
    default: None,
    enum_values: None,
    description: None,
    foreign_key: None,
  }
}

fn article_model(name: &str) -> NewModel {
  NewModel {
    name:          name.to_string(),
    description:   Some("test articles".to_string()),
    fields:        BTreeMap::from([
      ("title".to_string(), field(FieldType::String, true)),
      ("rating".to_string(), field(FieldType::Number, false)),
    ]),
    relationships: None,
    indexes:       None,
    embedding:     None,
  }
}

fn fields(value: Value) -> FieldMap {
  match value {
    Value::Object(map) => map,
    other => panic!("expected object, got {other}"),
  }
}

async fn seed_user(s: &SqliteStore, username: &str) -> Uuid {
  s.create_user(NewUser {
    username:      username.to_string(),
    email:         format!("{username}@example.com"),
    name:          username.to_string(),
    password_hash: "$argon2id$test".to_string(),
  })
  .await
  .unwrap()
  .id
}

// ─── Models ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_model() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;

  let model = s.create_model(owner, article_model("articles")).await.unwrap();
  assert_eq!(model.owner_id, owner);
  assert_eq!(model.status, ModelStatus::Active);

  let fetched = s.get_model(model.id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "articles");
  assert_eq!(fetched.fields.len(), 2);
  assert!(fetched.fields["title"].required);
}

#[tokio::test]
async fn duplicate_model_name_per_owner_is_rejected() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;

  s.create_model(owner, article_model("articles")).await.unwrap();
  let err = s
    .create_model(owner, article_model("articles"))
    .await
    .unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::ModelNameTaken(_)
  ));

  // A different owner may reuse the name.
  let other = seed_user(&s, "bob").await;
  assert!(s.create_model(other, article_model("articles")).await.is_ok());
}

#[tokio::test]
async fn deleted_model_frees_its_name() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;

  let model = s.create_model(owner, article_model("articles")).await.unwrap();
  s.delete_model(model.id).await.unwrap();
  assert!(s.get_model(model.id).await.unwrap().is_none());
  assert!(s.create_model(owner, article_model("articles")).await.is_ok());
}

#[tokio::test]
async fn archive_and_restore_toggle_status() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let archived = s
    .set_model_status(model.id, ModelStatus::Archived)
    .await
    .unwrap();
  assert_eq!(archived.status, ModelStatus::Archived);

  let restored = s
    .set_model_status(model.id, ModelStatus::Active)
    .await
    .unwrap();
  assert_eq!(restored.status, ModelStatus::Active);
}

#[tokio::test]
async fn update_model_renames_and_rechecks_uniqueness() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  s.create_model(owner, article_model("taken")).await.unwrap();
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let err = s
    .update_model(model.id, ModelPatch {
      name: Some("taken".to_string()),
      ..ModelPatch::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::ModelNameTaken(_)
  ));

  let renamed = s
    .update_model(model.id, ModelPatch {
      name: Some("posts".to_string()),
      ..ModelPatch::default()
    })
    .await
    .unwrap();
  assert_eq!(renamed.name, "posts");
  assert_eq!(renamed.fields.len(), 2, "fields survive a rename");
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_roundtrip_preserves_fields() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let payload = fields(json!({"title": "hello", "rating": 4.5}));
  let created = s
    .create_record(model.id, payload.clone(), None)
    .await
    .unwrap();

  let fetched = s.get_record(model.id, created.record_id).await.unwrap().unwrap();
  assert_eq!(fetched.fields, payload);
  assert_eq!(fetched.record_id, created.record_id);
  assert!(fetched.vector.is_none());
}

#[tokio::test]
async fn get_record_is_scoped_to_its_model() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let a = s.create_model(owner, article_model("a")).await.unwrap();
  let b = s.create_model(owner, article_model("b")).await.unwrap();

  let record = s
    .create_record(a.id, fields(json!({"title": "x"})), None)
    .await
    .unwrap();

  assert!(s.get_record(b.id, record.record_id).await.unwrap().is_none());
  let err = s.delete_record(b.id, record.record_id).await.unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::RecordNotFound(_)
  ));
}

#[tokio::test]
async fn pagination_counts_and_slices() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  for i in 0..7 {
    s.create_record(model.id, fields(json!({"title": format!("t{i}")})), None)
      .await
      .unwrap();
  }

  let q = |page, limit| ListQuery { filter: None, page, limit };

  let first = s.list_records(model.id, &q(1, 3)).await.unwrap();
  assert_eq!(first.records.len(), 3);
  assert_eq!(first.total, 7);

  let last = s.list_records(model.id, &q(3, 3)).await.unwrap();
  assert_eq!(last.records.len(), 1);
  assert_eq!(last.total, 7);

  let beyond = s.list_records(model.id, &q(9, 3)).await.unwrap();
  assert_eq!(beyond.records.len(), 0);
  assert_eq!(beyond.total, 7);
}

#[tokio::test]
async fn list_filters_match_fields_and_id() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let kept = s
    .create_record(model.id, fields(json!({"title": "keep", "rating": 5})), None)
    .await
    .unwrap();
  s.create_record(model.id, fields(json!({"title": "drop", "rating": 1})), None)
    .await
    .unwrap();

  let by_field = s
    .list_records(model.id, &ListQuery {
      filter: Some(fields(json!({"title": "keep"}))),
      page:   1,
      limit:  10,
    })
    .await
    .unwrap();
  assert_eq!(by_field.total, 1);
  assert_eq!(by_field.records[0].record_id, kept.record_id);

  let by_number = s
    .list_records(model.id, &ListQuery {
      filter: Some(fields(json!({"rating": 5}))),
      page:   1,
      limit:  10,
    })
    .await
    .unwrap();
  assert_eq!(by_number.total, 1);

  let by_id = s
    .list_records(model.id, &ListQuery {
      filter: Some(fields(json!({"_id": kept.record_id.to_string()}))),
      page:   1,
      limit:  10,
    })
    .await
    .unwrap();
  assert_eq!(by_id.total, 1);
  assert_eq!(by_id.records[0].record_id, kept.record_id);
}

#[tokio::test]
async fn update_record_replaces_fields_wholesale() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let created = s
    .create_record(model.id, fields(json!({"title": "v1", "rating": 1})), None)
    .await
    .unwrap();

  let updated = s
    .update_record(
      model.id,
      created.record_id,
      fields(json!({"title": "v2"})),
      None,
    )
    .await
    .unwrap();

  assert_eq!(updated.fields, fields(json!({"title": "v2"})));
  assert!(!updated.fields.contains_key("rating"));
  assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn vectors_are_stored_but_never_projected() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let vector = vec![0.5_f32; 4];
  let created = s
    .create_record(model.id, fields(json!({"title": "x"})), Some(vector.clone()))
    .await
    .unwrap();

  let fetched = s.get_record(model.id, created.record_id).await.unwrap().unwrap();
  assert!(fetched.vector.is_none(), "get must not expose the vector");

  let candidates = s.search_candidates(model.id, None).await.unwrap();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].vector.as_deref(), Some(vector.as_slice()));
}

#[tokio::test]
async fn set_record_vector_is_idempotent() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  let record = s
    .create_record(model.id, fields(json!({"title": "x"})), None)
    .await
    .unwrap();

  let vector = vec![0.25_f32; 8];
  s.set_record_vector(model.id, record.record_id, &vector)
    .await
    .unwrap();
  s.set_record_vector(model.id, record.record_id, &vector)
    .await
    .unwrap();

  let candidates = s.search_candidates(model.id, None).await.unwrap();
  assert_eq!(candidates[0].vector.as_deref(), Some(vector.as_slice()));
}

#[tokio::test]
async fn clear_records_reports_deleted_count() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = s.create_model(owner, article_model("articles")).await.unwrap();

  for i in 0..3 {
    s.create_record(model.id, fields(json!({"title": format!("t{i}")})), None)
      .await
      .unwrap();
  }

  assert_eq!(s.clear_records(model.id).await.unwrap(), 3);
  assert_eq!(s.clear_records(model.id).await.unwrap(), 0);
}

// ─── Views ───────────────────────────────────────────────────────────────────

async fn seeded_model(s: &SqliteStore, owner: Uuid) -> infinity_core::model::ModelDefinition {
  s.create_model(owner, NewModel {
    name:          "articles".to_string(),
    description:   None,
    fields:        BTreeMap::from([
      ("title".to_string(), field(FieldType::String, true)),
    ]),
    relationships: None,
    indexes:       None,
    embedding:     Some(EmbeddingConfig {
      enabled:       true,
      source_fields: vec!["title".to_string()],
    }),
  })
  .await
  .unwrap()
}

fn view_input(model_id: Uuid, name: &str, is_default: bool) -> NewView {
  NewView {
    model_id,
    name: name.to_string(),
    description: None,
    config: ViewConfig {
      columns:  vec![],
      filters:  vec![],
      sorting:  vec![],
      layout:   Default::default(),
      grouping: None,
      realtime: None,
    },
    is_default,
    is_public: false,
  }
}

async fn default_flags(s: &SqliteStore, model_id: Uuid, owner: Uuid) -> Vec<(Uuid, bool)> {
  s.list_views(model_id, owner)
    .await
    .unwrap()
    .into_iter()
    .map(|v: ModelView| (v.id, v.is_default))
    .collect()
}

#[tokio::test]
async fn create_default_view_unsets_previous_default() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = seeded_model(&s, owner).await;

  let a = s.create_view(owner, view_input(model.id, "a", true)).await.unwrap();
  let b = s.create_view(owner, view_input(model.id, "b", true)).await.unwrap();

  let flags = default_flags(&s, model.id, owner).await;
  assert_eq!(
    flags.iter().filter(|(_, d)| *d).count(),
    1,
    "exactly one default"
  );
  assert!(flags.contains(&(b.id, true)));
  assert!(flags.contains(&(a.id, false)));
}

#[tokio::test]
async fn set_default_view_swaps_atomically() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = seeded_model(&s, owner).await;

  let a = s.create_view(owner, view_input(model.id, "a", true)).await.unwrap();
  let b = s.create_view(owner, view_input(model.id, "b", false)).await.unwrap();

  let promoted = s.set_default_view(model.id, owner, b.id).await.unwrap();
  assert!(promoted.is_default);

  let flags = default_flags(&s, model.id, owner).await;
  assert!(flags.contains(&(b.id, true)));
  assert!(flags.contains(&(a.id, false)));
}

#[tokio::test]
async fn set_default_view_out_of_scope_rolls_back() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let stranger = seed_user(&s, "bob").await;
  let model = seeded_model(&s, owner).await;

  let a = s.create_view(owner, view_input(model.id, "a", true)).await.unwrap();

  // The stranger does not own view `a`: the swap must fail and leave the
  // owner's default untouched.
  let err = s.set_default_view(model.id, stranger, a.id).await.unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::ViewNotFound(_)
  ));

  let flags = default_flags(&s, model.id, owner).await;
  assert!(flags.contains(&(a.id, true)), "default survived the failed swap");
}

#[tokio::test]
async fn get_default_view_falls_back_to_public() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let viewer = seed_user(&s, "bob").await;
  let model = seeded_model(&s, owner).await;

  let mut input = view_input(model.id, "shared", true);
  input.is_public = true;
  let shared = s.create_view(owner, input).await.unwrap();

  // The viewer has no default of their own; the public default applies.
  let found = s.get_default_view(model.id, viewer).await.unwrap().unwrap();
  assert_eq!(found.id, shared.id);

  // No default anywhere => None.
  let other = s.create_model(owner, article_model("other")).await.unwrap();
  assert!(s.get_default_view(other.id, viewer).await.unwrap().is_none());
}

#[tokio::test]
async fn update_view_is_owner_gated() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let stranger = seed_user(&s, "bob").await;
  let model = seeded_model(&s, owner).await;
  let view = s.create_view(owner, view_input(model.id, "a", false)).await.unwrap();

  let err = s
    .update_view(view.id, stranger, ViewPatch {
      name: Some("hijack".to_string()),
      ..ViewPatch::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::NotOwner
  ));

  let renamed = s
    .update_view(view.id, owner, ViewPatch {
      name: Some("mine".to_string()),
      ..ViewPatch::default()
    })
    .await
    .unwrap();
  assert_eq!(renamed.name, "mine");
}

#[tokio::test]
async fn deleting_the_last_default_view_is_rejected() {
  let s = store().await;
  let owner = seed_user(&s, "alice").await;
  let model = seeded_model(&s, owner).await;
  let only = s.create_view(owner, view_input(model.id, "only", true)).await.unwrap();

  let err = s.delete_view(only.id, owner).await.unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::LastView
  ));

  s.create_view(owner, view_input(model.id, "second", false)).await.unwrap();
  assert!(s.delete_view(only.id, owner).await.is_ok());
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_username_or_email_is_rejected() {
  let s = store().await;
  seed_user(&s, "alice").await;

  let err = s
    .create_user(NewUser {
      username:      "alice".to_string(),
      email:         "fresh@example.com".to_string(),
      name:          "Alice".to_string(),
      password_hash: "$argon2id$test".to_string(),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    infinity_core::Error::from(err),
    infinity_core::Error::UserExists
  ));
}

#[tokio::test]
async fn api_key_lookup_requires_active_status() {
  let s = store().await;
  let user = seed_user(&s, "alice").await;

  let key = s.create_api_key(user, "ci", "hash-1").await.unwrap();
  let found = s.find_api_key_by_hash("hash-1").await.unwrap().unwrap();
  assert_eq!(found.id, key.id);
  assert!(found.last_used_at.is_some(), "lookup touches last_used_at");

  s.delete_api_key(key.id, user).await.unwrap();
  assert!(s.find_api_key_by_hash("hash-1").await.unwrap().is_none());
}

#[tokio::test]
async fn revoked_tokens_are_remembered() {
  let s = store().await;
  let user = seed_user(&s, "alice").await;

  assert!(!s.is_token_revoked("t-hash").await.unwrap());
  s.revoke_token("t-hash", user).await.unwrap();
  assert!(s.is_token_revoked("t-hash").await.unwrap());
  // Idempotent.
  s.revoke_token("t-hash", user).await.unwrap();
  assert!(s.is_token_revoked("t-hash").await.unwrap());
}
