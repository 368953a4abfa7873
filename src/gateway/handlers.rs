//! One handler per route (spec.md §6). Every handler: validates (422, no
//! charge on failure), reserves credit, runs the operation, then commits or
//! refunds depending on whether the result is a success or failure envelope
//! — never lets an operation-level error escape as a bare HTTP 5xx.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};

use crate::clock::OsRand;
use crate::credit::{CreditError, Reservation};
use crate::error::{GatewayError, GatewayResult};
use crate::model::ArtifactKind;
use crate::operations::{JsonExtractionParams, OperationRunner};

use super::auth::extract_bearer;
use super::response::{artifact_response, failure_json, success_json};
use super::schemas::{
    DeleteFileQuery, JsonExtractionRequest, LinksRequest, ListFilesQuery, PdfRequest, ScrapeRequest,
    ScreenshotRequest, SearchRequest,
};
use super::AppState;

const COST_WEB_OP: u32 = 1;
const COST_JSON_EXTRACTION: u32 = 2;

async fn authenticate(state: &AppState, headers: &HeaderMap) -> GatewayResult<String> {
    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = extract_bearer(header_value)?;
    state.auth.resolve(token).await
}

fn reserve(state: &AppState, user_id: &str, cost: u32) -> GatewayResult<Reservation> {
    state.credit.reserve(user_id, cost).map_err(|e| match e {
        CreditError::Insufficient => GatewayError::CreditExhausted,
    })
}

/// Settles `reservation` against whether `result` is a success or failure
/// envelope, then renders it. `result` is the operation's own `Result`; an
/// `Err` here means the runner returned `Err` (surfaced as a failure
/// envelope, refunded) rather than a propagated HTTP error.
fn settle_json(state: &AppState, reservation: Reservation, result: anyhow::Result<serde_json::Value>, cost: u32) -> Response {
    match result {
        Ok(data) => {
            state.credit.commit(&reservation);
            success_json(data, cost)
        }
        Err(e) => {
            state.credit.refund(&reservation);
            tracing::warn!(error = %e, "operation failed");
            failure_json(e.to_string())
        }
    }
}

pub async fn markdown(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<super::schemas::CommonRequest>) -> Response {
    match req.validate() {
        Ok(()) => {}
        Err(e) => return e.into_response(),
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let result = runner.markdown(&req.url, req.wait_time_ms, &OsRand).await;
    settle_json(&state, reservation, result, COST_WEB_OP)
}

pub async fn content(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<super::schemas::CommonRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let result = runner.content(&req.url, req.wait_time_ms, &OsRand).await;
    settle_json(&state, reservation, result, COST_WEB_OP)
}

pub async fn links(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<LinksRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let result = runner
        .links(&req.common.url, req.include_external, req.common.wait_time_ms, &OsRand)
        .await;
    settle_json(&state, reservation, result, COST_WEB_OP)
}

pub async fn scrape(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ScrapeRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let result = runner
        .scrape(
            &req.common.url,
            &req.elements,
            req.headers.as_ref(),
            req.common.wait_time_ms,
            &OsRand,
        )
        .await;
    settle_json(&state, reservation, result, COST_WEB_OP)
}

pub async fn screenshot(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ScreenshotRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let viewport = req.viewport.as_ref().map(|v| (v.width, v.height));
    let captured = runner
        .screenshot(
            &req.common.url,
            &req.screenshot_options,
            viewport,
            req.common.wait_time_ms,
            &OsRand,
        )
        .await;

    let (bytes, content_type) = match captured {
        Ok(v) => v,
        Err(e) => {
            state.credit.refund(&reservation);
            tracing::warn!(error = %e, "screenshot failed");
            return failure_json(e.to_string());
        }
    };

    let format_ext = content_type.rsplit('/').next().unwrap_or("png");
    let actor = state.user_actors.get_or_open(&user_id).await;
    let metadata = serde_json::to_string(&json!({ "screenshotOptions": req.screenshot_options })).unwrap_or_default();
    let recorded = actor
        .record(ArtifactKind::Screenshot, &req.common.url, bytes.clone(), metadata, Some(format_ext))
        .await;

    match recorded {
        Ok(outcome) => {
            state.credit.commit(&reservation);
            if req.base64 {
                use base64::engine::general_purpose::STANDARD as BASE64;
                use base64::Engine;
                success_json(
                    json!({
                        "image": BASE64.encode(&bytes),
                        "fileId": outcome.file_id,
                        "publicUrl": outcome.public_url,
                    }),
                    COST_WEB_OP,
                )
            } else {
                artifact_response(bytes, content_type, false, "image", COST_WEB_OP)
            }
        }
        Err(e) => {
            state.credit.refund(&reservation);
            tracing::warn!(error = %e, "artifact persistence failed");
            failure_json(e.to_string())
        }
    }
}

pub async fn pdf(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<PdfRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let captured = runner.pdf(&req.common.url, req.common.wait_time_ms, &OsRand).await;

    let bytes = match captured {
        Ok(b) => b,
        Err(e) => {
            state.credit.refund(&reservation);
            tracing::warn!(error = %e, "pdf generation failed");
            return failure_json(e.to_string());
        }
    };

    let actor = state.user_actors.get_or_open(&user_id).await;
    let metadata = "{}".to_string();
    let recorded = actor
        .record(ArtifactKind::Pdf, &req.common.url, bytes.clone(), metadata, None)
        .await;

    match recorded {
        Ok(outcome) => {
            state.credit.commit(&reservation);
            if req.base64 {
                use base64::engine::general_purpose::STANDARD as BASE64;
                use base64::Engine;
                success_json(
                    json!({
                        "pdf": BASE64.encode(&bytes),
                        "fileId": outcome.file_id,
                        "publicUrl": outcome.public_url,
                    }),
                    COST_WEB_OP,
                )
            } else {
                artifact_response(bytes, "application/pdf", false, "pdf", COST_WEB_OP)
            }
        }
        Err(e) => {
            state.credit.refund(&reservation);
            tracing::warn!(error = %e, "artifact persistence failed");
            failure_json(e.to_string())
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    client_addr: Option<axum::extract::ConnectInfo<SocketAddr>>,
    Json(req): Json<SearchRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_WEB_OP) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let client_ip: IpAddr = client_addr
        .map(|c| c.0.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]));

    let result = state
        .search
        .search(&req.query, req.limit as usize, client_ip, &OsRand)
        .await
        .and_then(|r| Ok(serde_json::to_value(r)?));

    settle_json(&state, reservation, result, COST_WEB_OP)
}

pub async fn json_extraction(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<JsonExtractionRequest>) -> Response {
    if let Err(e) = req.validate() {
        return e.into_response();
    }
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };
    let reservation = match reserve(&state, &user_id, COST_JSON_EXTRACTION) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let runner = state.operation_runner();
    let params = JsonExtractionParams {
        response_type: req.response_type,
        prompt: req.prompt.clone(),
        response_format: req.response_format.clone(),
        instructions: req.instructions.clone(),
    };
    let result = runner
        .json_extraction(&req.common.url, params, req.common.wait_time_ms, &OsRand)
        .await;
    settle_json(&state, reservation, result, COST_JSON_EXTRACTION)
}

pub async fn list_files(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<ListFilesQuery>) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    let actor = state.user_actors.get_or_open(&user_id).await;
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    let files = match actor
        .list(query.kind.as_deref(), limit, offset, query.sort_by.as_deref(), query.order.as_deref())
        .await
    {
        Ok(f) => f,
        Err(e) => return GatewayError::Internal(e.into()).into_response(),
    };
    let total = match actor.count(query.kind.as_deref()).await {
        Ok(c) => c,
        Err(e) => return GatewayError::Internal(e.into()).into_response(),
    };
    let has_more = (offset as i64) + (files.len() as i64) < total;

    Json(json!({
        "files": files,
        "totalFiles": total,
        "hasMore": has_more,
    }))
    .into_response()
}

pub async fn get_file(State(state): State<AppState>, headers: HeaderMap, Path(file_id): Path<String>) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    let actor = state.user_actors.get_or_open(&user_id).await;
    match actor.get(&file_id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => GatewayError::NotFound.into_response(),
        Err(e) => GatewayError::Internal(e.into()).into_response(),
    }
}

pub async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
    Query(query): Query<DeleteFileQuery>,
) -> Response {
    let user_id = match authenticate(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    let actor = state.user_actors.get_or_open(&user_id).await;
    let also_from_storage = query.also_from_storage.unwrap_or(false);
    match actor.delete(&file_id, also_from_storage).await {
        Ok(outcome) if outcome.found => Json(json!({
            "deleted": outcome.deleted_from_db,
            "deletedFromStorage": outcome.deleted_from_storage,
        }))
        .into_response(),
        Ok(_) => GatewayError::NotFound.into_response(),
        Err(e) => GatewayError::Internal(e.into()).into_response(),
    }
}
