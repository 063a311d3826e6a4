//! `/healthz`, outside both the auth and rate-limit layers.

use axum::response::Response;

use crate::infrastructure::http::response::ok;

pub async fn healthz() -> Response {
    ok(serde_json::json!({ "healthy": true }))
}
