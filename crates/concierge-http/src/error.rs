//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use concierge_agent::DispatchError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Errors raised by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dispatch(err) => match err {
                DispatchError::UnknownSpecialist { .. } => StatusCode::NOT_FOUND,
                DispatchError::UnknownTask { .. } | DispatchError::TaskRejected { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DispatchError::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
                DispatchError::SpecialistError { .. } => StatusCode::BAD_GATEWAY,
                DispatchError::SpecialistUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                DispatchError::InvalidRegistry(_) | DispatchError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Dispatch(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Errors starting or running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
