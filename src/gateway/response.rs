//! Envelope serialization and the screenshot/PDF binary-vs-base64 split
//! (spec.md §4.8, §6).

use axum::http::header;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::Envelope;

pub fn success_json<T: Serialize>(data: T, credits_cost: u32) -> Response {
    axum::Json(Envelope::success(data, credits_cost)).into_response()
}

pub fn failure_json(message: impl Into<String>) -> Response {
    axum::Json(Envelope::<Value>::failure(message)).into_response()
}

/// Either raw bytes with the matching `Content-Type` (the default), or a
/// JSON envelope carrying the base64-encoded payload under `field_name`,
/// selected by the caller's `base64` flag.
pub fn artifact_response(
    bytes: Vec<u8>,
    content_type: &str,
    base64_requested: bool,
    field_name: &str,
    credits_cost: u32,
) -> Response {
    if base64_requested {
        let encoded = BASE64.encode(&bytes);
        success_json(json!({ field_name: encoded }), credits_cost)
    } else {
        ([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response()
    }
}
