//! JSON success envelope: `{"success": true, "data": ..., "meta"?: ...}`.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};

pub fn ok<T: Serialize>(data: T) -> Json<Value> {
  Json(json!({ "success": true, "data": data }))
}

pub fn ok_with_meta<T: Serialize>(data: T, meta: Value) -> Json<Value> {
  Json(json!({ "success": true, "data": data, "meta": meta }))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Value>) {
  (StatusCode::CREATED, ok(data))
}
