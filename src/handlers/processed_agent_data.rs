//! # Processed Agent Data Handlers
//!
//! This module contains handlers for the `/processed_agent_data` endpoints:
//! single and batch insert, filtered listing with cursor pagination, lookup and
//! deletion. Every stored record is also pushed to the owning user's live feed.

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::IntoParams;

use crate::cursor::{decode_cursor, encode_cursor};
use crate::error::{ApiError, validation_error};
use crate::handlers::types::PaginatedResponse;
use crate::models::timestamp::parse_timestamp;
use crate::models::{NewProcessedAgentRecord, ProcessedAgentData, ProcessedAgentRecord};
use crate::repositories::{ListQuery, RecordFilter, SortDirection};
use crate::server::AppState;

/// Query parameters for listing processed agent data
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRecordsQuery {
    /// Only records submitted by this user
    pub user_id: Option<i32>,
    /// Only records with exactly this classification
    pub road_state: Option<String>,
    /// Earliest reading time, inclusive (ISO 8601)
    pub timestamp_from: Option<String>,
    /// Latest reading time, inclusive (ISO 8601)
    pub timestamp_to: Option<String>,
    /// `true` for records with both coordinates, `false` for records missing either
    pub has_location: Option<bool>,
    /// `asc` (default) or `desc` by id
    pub order: Option<String>,
    /// Maximum number of records to return (default and maximum are configurable)
    pub limit: Option<i64>,
    /// Opaque cursor for pagination continuation
    pub cursor: Option<String>,
}

fn parse_time_param(name: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            validation_error(
                &format!("{name} must be an ISO 8601 timestamp"),
                json!({ name: raw }),
            )
        }),
    }
}

impl ListRecordsQuery {
    fn into_list_query(self, default_limit: u64, max_limit: u64) -> Result<ListQuery, ApiError> {
        let limit = match self.limit {
            None => default_limit,
            Some(limit) if limit >= 1 && (limit as u64) <= max_limit => limit as u64,
            Some(_) => {
                return Err(ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_FAILED",
                    format!("limit must be between 1 and {max_limit}"),
                ));
            }
        };

        let direction = match self.order.as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(validation_error(
                    "order must be 'asc' or 'desc'",
                    json!({ "order": other }),
                ));
            }
        };

        let after = self.cursor.as_deref().map(decode_cursor).transpose()?;

        Ok(ListQuery {
            filter: RecordFilter {
                user_id: self.user_id,
                road_state: self.road_state,
                timestamp_from: parse_time_param("timestamp_from", self.timestamp_from)?,
                timestamp_to: parse_time_param("timestamp_to", self.timestamp_to)?,
                has_location: self.has_location,
            },
            direction,
            limit,
            after,
        })
    }
}

/// Store a single classified reading
#[utoipa::path(
    post,
    path = "/processed_agent_data",
    request_body = NewProcessedAgentRecord,
    responses(
        (status = 201, description = "Record stored", body = ProcessedAgentRecord),
        (status = 400, description = "Missing or empty road_state, or malformed body", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "road_state must not be empty",
            "trace_id": "corr-12345678"
        })),
        (status = 503, description = "Database unavailable", body = ApiError, example = json!({
            "code": "DATABASE_UNAVAILABLE",
            "message": "Database service temporarily unavailable",
            "retry_after": 5,
            "trace_id": "corr-55555555"
        }))
    ),
    tag = "processed_agent_data"
)]
pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<NewProcessedAgentRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<ProcessedAgentRecord>), ApiError> {
    let Json(payload) = payload?;

    let model = state.store.insert(payload).await?;
    let record = ProcessedAgentRecord::from(model);

    state.feed.publish(&record).await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Store a batch of nested agent readings atomically
#[utoipa::path(
    post,
    path = "/processed_agent_data/batch",
    request_body = Vec<ProcessedAgentData>,
    responses(
        (status = 201, description = "All records stored", body = Vec<ProcessedAgentRecord>),
        (status = 400, description = "Empty batch or invalid member; nothing stored", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "record 2: road_state must not be empty",
            "trace_id": "corr-12345678"
        })),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "processed_agent_data"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ProcessedAgentData>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<ProcessedAgentRecord>>), ApiError> {
    let Json(payload) = payload?;

    if payload.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "batch must contain at least one record",
        ));
    }

    let records = payload
        .into_iter()
        .map(NewProcessedAgentRecord::from)
        .collect();

    let stored: Vec<ProcessedAgentRecord> = state
        .store
        .insert_many(records)
        .await?
        .into_iter()
        .map(ProcessedAgentRecord::from)
        .collect();

    for record in &stored {
        state.feed.publish(record).await;
    }

    info!(count = stored.len(), "Stored batch of processed agent data");

    Ok((StatusCode::CREATED, Json(stored)))
}

/// List stored readings with filters and cursor pagination
#[utoipa::path(
    get,
    path = "/processed_agent_data",
    params(ListRecordsQuery),
    responses(
        (status = 200, description = "One page of records", body = PaginatedResponse<ProcessedAgentRecord>),
        (status = 400, description = "Invalid query parameters", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "limit must be between 1 and 500",
            "trace_id": "corr-12345678"
        })),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "processed_agent_data"
)]
pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<ListRecordsQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<ProcessedAgentRecord>>, ApiError> {
    let Query(query) = query?;

    let list_query =
        query.into_list_query(state.config.list.default_limit, state.config.list.max_limit)?;

    let page = state.store.list(&list_query).await?;
    let next_cursor = page.next_cursor.map(encode_cursor);
    let data = page
        .records
        .into_iter()
        .map(ProcessedAgentRecord::from)
        .collect();

    Ok(Json(PaginatedResponse::new(data, next_cursor)))
}

/// Fetch one stored reading
#[utoipa::path(
    get,
    path = "/processed_agent_data/{id}",
    params(("id" = i32, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "Record found", body = ProcessedAgentRecord),
        (status = 400, description = "Identifier is not an integer", body = ApiError),
        (status = 404, description = "No record with this identifier", body = ApiError, example = json!({
            "code": "NOT_FOUND",
            "message": "processed agent data 9999 not found",
            "trace_id": "corr-12345678"
        }))
    ),
    tag = "processed_agent_data"
)]
pub async fn get_record(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ProcessedAgentRecord>, ApiError> {
    let Path(id) = id?;

    let model = state.store.get_by_id(id).await?;

    Ok(Json(model.into()))
}

/// Delete one stored reading, returning it as it was
#[utoipa::path(
    delete,
    path = "/processed_agent_data/{id}",
    params(("id" = i32, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "Record removed", body = ProcessedAgentRecord),
        (status = 400, description = "Identifier is not an integer", body = ApiError),
        (status = 404, description = "No record with this identifier", body = ApiError)
    ),
    tag = "processed_agent_data"
)]
pub async fn delete_record(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ProcessedAgentRecord>, ApiError> {
    let Path(id) = id?;

    let removed = state.store.delete(id).await?;

    Ok(Json(removed.into()))
}
