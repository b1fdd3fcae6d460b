//! Telemetry record endpoints
//!
//! Bodies are taken as raw bytes and decoded here so that malformed JSON is
//! reported through the same 422 shape as field-level validation failures.
//! A non-integer `:id` is reported the same way, located at `path.id`.

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use telemetry_core::{ProcessedRecord, ValidationError};

use super::{ApiError, AppState};

fn parse_body(body: &Bytes) -> Result<Value, ValidationError> {
    serde_json::from_slice(body)
        .map_err(|e| ValidationError::new(Vec::<&str>::new(), format!("Invalid JSON: {}", e)))
}

/// Ingest a batch of telemetry entries
///
/// POST /processed_agent_data/
pub async fn create_records(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let value = parse_body(&body)?;
    state.service.ingest_json(value).await?;
    Ok(StatusCode::OK)
}

/// Get one record
///
/// GET /processed_agent_data/:id
pub async fn get_record(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProcessedRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get(id).await?))
}

/// List all records
///
/// GET /processed_agent_data/
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProcessedRecord>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

/// Replace one record from a single ingestion entry
///
/// PUT /processed_agent_data/:id
pub async fn update_record(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<ProcessedRecord>, ApiError> {
    let Path(id) = id?;
    let value = parse_body(&body)?;
    Ok(Json(state.service.update_json(id, value).await?))
}

/// Delete one record, returning it
///
/// DELETE /processed_agent_data/:id
pub async fn delete_record(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProcessedRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.delete(id).await?))
}
