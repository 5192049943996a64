use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::{inquiries::FieldViolation, store::StoreError};

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<FieldViolation>>,
}

impl ApiMessage {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            violations: None,
        }
    }
}

/// Every failure an HTTP handler can surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(Vec<FieldViolation>),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("invalid request parameter: {0}")]
    InvalidParameter(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session token expired")]
    TokenExpired,
    #[error("inquiry {0} not found")]
    NotFound(i64),
    #[error("Not found")]
    RouteNotFound,
    #[error("{0}")]
    Dependency(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::MalformedBody(_)
            | ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized
            | ApiError::InvalidCredentials
            | ApiError::InvalidToken
            | ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_failed",
            ApiError::MalformedBody(_) => "malformed_body",
            ApiError::InvalidParameter(_) => "invalid_parameter",
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidToken => "invalid_token",
            ApiError::TokenExpired => "token_expired",
            ApiError::NotFound(_) | ApiError::RouteNotFound => "not_found",
            ApiError::Dependency(_) => "dependency_failure",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ApiMessage::new(self.code(), self.to_string());
        if let ApiError::Validation(violations) = self {
            body.violations = Some(violations);
        }
        (status, Json(body)).into_response()
    }
}

/// Maps a store failure for the operation described by `context`. Anything
/// other than a missing row is logged here and reported as a dependency
/// failure.
pub fn store_failure(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |err| match err {
        StoreError::NotFound(id) => ApiError::NotFound(id),
        other => {
            error!(err = ?other, "{context}");
            ApiError::Dependency(context)
        }
    }
}
