//! # Error Handling
//!
//! This module provides the error taxonomy of the store (`RepositoryError`) and
//! its mapping onto a consistent problem+json HTTP response format with trace ID
//! propagation (`ApiError`).

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::sqlx;
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Seconds a client should wait before retrying after a transient storage failure
const STORAGE_RETRY_AFTER_SECONDS: u64 = 5;

/// Errors surfaced by the storage layer.
///
/// The three kinds are disjoint: a validation failure never reaches the
/// database, a missing record is never reported as a storage failure, and a
/// storage failure is never masked as an empty result.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Input rejected before any persistence attempt
    #[error("validation failed: {0}")]
    Validation(String),
    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying persistence engine failure
    #[error("database error: {0}")]
    Database(#[source] DbErr),
}

impl RepositoryError {
    /// Wrap a SeaORM error, keeping `RecordNotFound` distinct from storage failures.
    pub fn database_error(error: DbErr) -> Self {
        match error {
            DbErr::RecordNotFound(message) => Self::NotFound(message),
            other => Self::Database(other),
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Connection and pool-acquire failures, connections lost mid-statement,
    /// serialization failures, deadlocks, server shutdowns and SQLite busy/locked
    /// are transient. Constraint violations, malformed queries and decoding
    /// failures are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(error) => is_transient_db_error(error),
            Self::Validation(_) | Self::NotFound(_) => false,
        }
    }
}

impl From<DbErr> for RepositoryError {
    fn from(error: DbErr) -> Self {
        Self::database_error(error)
    }
}

fn is_transient_db_error(error: &DbErr) -> bool {
    if error.sql_err().is_some() {
        return false;
    }
    match error {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(err)) | DbErr::Query(RuntimeErr::SqlxError(err)) => {
            is_transient_sqlx_error(err)
        }
        _ => false,
    }
}

fn is_transient_sqlx_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_error) => db_error
            .code()
            .is_some_and(|code| is_transient_error_code(&code)),
        _ => false,
    }
}

/// Postgres SQLSTATE class 40 (serialization failure, deadlock) and 57P0x
/// (shutdown), or SQLite BUSY/LOCKED including extended codes.
fn is_transient_error_code(code: &str) -> bool {
    if code.len() == 5 && (code.starts_with("40") || code.starts_with("57P0")) {
        return true;
    }
    const SQLITE_BUSY: i32 = 5;
    const SQLITE_LOCKED: i32 = 6;
    code.parse::<i32>()
        .is_ok_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    #[schema(value_type = String)]
    pub code: Box<str>,
    /// Human-readable error message
    #[schema(value_type = String)]
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the active request (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Validation(message) => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
            }
            RepositoryError::NotFound(message) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            RepositoryError::Database(db_err) => {
                if is_transient_db_error(&db_err) {
                    tracing::warn!(error = ?db_err, "Transient database failure");
                    return Self::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "DATABASE_UNAVAILABLE",
                        "Database service temporarily unavailable",
                    )
                    .with_retry_after(STORAGE_RETRY_AFTER_SECONDS);
                }

                match db_err.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(detail)) => {
                        tracing::debug!(%detail, "Unique constraint violation detected");
                        Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists")
                    }
                    _ => {
                        tracing::error!(error = ?db_err, "Database error");
                        Self::new(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "INTERNAL_SERVER_ERROR",
                            "Database error occurred",
                        )
                    }
                }
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            format!("Invalid query parameters: {}", rejection.body_text()),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            format!("Invalid path parameter: {}", rejection.body_text()),
        )
    }
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;
    use serde_json::json;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Test error message",
        );

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.details, None);
        assert_eq!(error.retry_after, None);
    }

    #[test]
    fn test_api_error_with_details() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Test error message")
            .with_details(json!({"field": "value"}));

        assert_eq!(error.details, Some(Box::new(json!({"field": "value"}))));
    }

    #[test]
    fn test_from_anyhow() {
        let api_error: ApiError = anyhow::anyhow!("Something went wrong").into();

        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.code, Box::from("INTERNAL_SERVER_ERROR"));
        assert_eq!(api_error.message, Box::from("An internal error occurred"));
    }

    #[test]
    fn test_content_type_header() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "Test error");

        let response = error.into_response();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_retry_after_header() {
        let error = ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "DATABASE_UNAVAILABLE",
            "Database service temporarily unavailable",
        )
        .with_retry_after(5);

        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("retry-after").unwrap(), "5");
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Test error",
        );

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13); // "corr-" + 8 chars
    }

    #[test]
    fn test_record_not_found_becomes_not_found() {
        let error = RepositoryError::database_error(DbErr::RecordNotFound("id 7".to_string()));
        assert!(matches!(error, RepositoryError::NotFound(ref msg) if msg == "id 7"));
        assert!(!error.is_transient());

        let api_error: ApiError = error.into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.code, Box::from("NOT_FOUND"));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let api_error: ApiError =
            RepositoryError::Validation("road_state must not be empty".to_string()).into();

        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.code, Box::from("VALIDATION_FAILED"));
        assert!(api_error.message.contains("road_state"));
    }

    #[test]
    fn test_connection_failure_is_transient() {
        let error = RepositoryError::Database(DbErr::Conn(RuntimeErr::Internal(
            "connection refused".to_string(),
        )));
        assert!(error.is_transient());

        let api_error: ApiError = error.into();
        assert_eq!(api_error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_error.code, Box::from("DATABASE_UNAVAILABLE"));
        assert_eq!(api_error.retry_after, Some(STORAGE_RETRY_AFTER_SECONDS));
    }

    #[derive(Debug)]
    struct CodedDatabaseError(&'static str);

    impl std::fmt::Display for CodedDatabaseError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "database error {}", self.0)
        }
    }

    impl std::error::Error for CodedDatabaseError {}

    impl sqlx::error::DatabaseError for CodedDatabaseError {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn coded(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(CodedDatabaseError(code)))
    }

    #[test]
    fn test_lost_connection_during_statement_is_transient() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let error = RepositoryError::Database(DbErr::Query(RuntimeErr::SqlxError(
            sqlx::Error::Io(reset),
        )));
        assert!(error.is_transient());

        let api_error: ApiError = error.into();
        assert_eq!(api_error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_error.retry_after, Some(STORAGE_RETRY_AFTER_SECONDS));

        for err in [
            sqlx::Error::PoolTimedOut,
            sqlx::Error::PoolClosed,
            sqlx::Error::WorkerCrashed,
        ] {
            let error = RepositoryError::Database(DbErr::Exec(RuntimeErr::SqlxError(err)));
            assert!(error.is_transient(), "{error}");
        }
    }

    #[test]
    fn test_contention_codes_are_transient() {
        // Postgres serialization failure, deadlock, admin shutdown; SQLite BUSY,
        // LOCKED, BUSY_SNAPSHOT
        for code in ["40001", "40P01", "57P01", "5", "6", "517"] {
            let error = RepositoryError::Database(DbErr::Exec(RuntimeErr::SqlxError(coded(code))));
            assert!(error.is_transient(), "code {code}");
        }

        // Postgres syntax error, SQLite CHECK constraint
        for code in ["42601", "275"] {
            let error = RepositoryError::Database(DbErr::Query(RuntimeErr::SqlxError(coded(code))));
            assert!(!error.is_transient(), "code {code}");
        }
    }

    #[test]
    fn test_query_failure_is_permanent() {
        let error = RepositoryError::Database(DbErr::Query(RuntimeErr::Internal(
            "syntax error".to_string(),
        )));
        assert!(!error.is_transient());

        let api_error: ApiError = error.into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.retry_after, None);
    }

    #[test]
    fn test_validation_error_with_details() {
        let field_errors = json!({ "road_state": "must not be empty" });

        let error = validation_error("Validation failed", field_errors.clone());

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.details, Some(Box::new(field_errors)));
    }
}
