//! Success envelope: every response is `{"status":"ok","data":...}` or
//! `{"status":"error","message":...}`. The error half lives in
//! [`super::error`]; this module is just the `ok` side (always a tagged
//! top-level shape, never a bare array/object).

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    data: T,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope { status: "ok", data }).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (axum::http::StatusCode::CREATED, Json(Envelope { status: "ok", data })).into_response()
}
