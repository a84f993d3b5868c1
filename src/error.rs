//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid url for {key}: {value}")]
    InvalidUrl { key: &'static str, value: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("validation: {0}")]
    Validation(String),
}

/// Terminal failure of an upstream after retries (or schema checks) are exhausted.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("{source_name} unavailable (host {host}): {reason}")]
    SourceUnavailable {
        source_name: &'static str,
        host: String,
        reason: String,
    },
}

impl FetchError {
    pub fn source_name(&self) -> &'static str {
        match self {
            FetchError::SourceUnavailable { source_name, .. } => source_name,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            FetchError::SourceUnavailable { host, .. } => host,
        }
    }
}

/// Per-record rejection: names every failing field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid fields: {}", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact store read: {0}")]
    Store(String),
    #[error("no refresh run recorded")]
    NoRun,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    ServiceUnavailable(#[from] FetchError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            AppError::Validation { details, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", details.clone())
            }
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found", None)
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            }
            AppError::ServiceUnavailable(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                Some(serde_json::json!({ "source": e.source_name(), "host": e.host() })),
            ),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
