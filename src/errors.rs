//! Error taxonomy for the query core, mapped onto HTTP status codes at the
//! transport edge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors surfaced by the resolvers and the metadata store.
///
/// Filter-decode failures never reach this type — they are caught and
/// logged at the point of use and treated as "no match" (spec §4.H).
#[derive(Debug)]
pub enum ApiError {
    /// The referenced upload/dump does not exist or is not completed.
    MissingDump,
    /// Malformed request input (bad cursor, bad numeric parameter).
    InvalidArgument(String),
    /// The request's cancellation token fired before completion.
    Cancelled,
    /// Bundle-service or database I/O failure.
    Transient(anyhow::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::MissingDump => write!(f, "missing dump"),
            ApiError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ApiError::Cancelled => write!(f, "request cancelled"),
            ApiError::Transient(err) => write!(f, "transient error: {err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transient(err) => err.source(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Transient(err.into())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transient(err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Transient(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingDump => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Cancelled => StatusCode::BAD_REQUEST,
            ApiError::Transient(err) => {
                tracing::error!("transient resolver error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
