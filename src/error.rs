//! Error types for the analytics engine and the HTTP API

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Failure of a store performance computation. Empty data is never an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("metric source unavailable during {query}: {reason}")]
    SourceUnavailable { query: &'static str, reason: String },

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("store identifier is required")]
    MissingStore,
}

/// Error returned from HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Stats(StatsError::SourceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Stats(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Internal details stay in the logs
        let message = match &self {
            Self::Database(_) => "Server Error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_failures_map_to_service_unavailable() {
        let err = ApiError::from(StatsError::SourceUnavailable {
            query: "peak_day",
            reason: "timed out".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("peak_day"));
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let err = ApiError::from(StatsError::InvalidRange { start, end });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(StatsError::MissingStore).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("page").status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_errors_are_internal() {
        let err = ApiError::from(anyhow::anyhow!("disk I/O error"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
