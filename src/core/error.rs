//! Typed errors for the endpoints framework
//!
//! Two families live here:
//!
//! - [`BuilderError`]: raised synchronously by configuration operations and by
//!   application assembly. Every variant maps to one failure class (ordering,
//!   malformed input, uniqueness, missing state, collaborator contract, missing
//!   external configuration).
//! - [`ApiError`]: raised while serving requests. It renders as a JSON body and
//!   travels in the response extensions so the error handler mounted last can
//!   rewrite it.
//!
//! # Example
//!
//! ```rust,ignore
//! match builder.configure_entity("users", EntityOptions::default()) {
//!     Err(BuilderError::Duplicate(msg)) => eprintln!("already configured: {}", msg),
//!     Err(e) => return Err(e),
//!     Ok(_) => {}
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the configuration builder and application assembly
#[derive(Debug, Error)]
pub enum BuilderError {
    /// An operation was called out of its required order
    #[error("sequence error: {0}")]
    Sequence(String),

    /// An input value or shape is malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// A uniqueness invariant was violated
    #[error("duplicate error: {0}")]
    Duplicate(String),

    /// Required prior state is missing
    #[error("state error: {0}")]
    State(String),

    /// A collaborator lacks a required capability
    #[error("contract error: {0}")]
    Contract(String),

    /// Required external configuration (e.g. a secret) is missing
    #[error("config error: {0}")]
    Config(String),

    /// The application initialize hook failed
    #[error("initialization failed: {0}")]
    Initialize(#[source] anyhow::Error),
}

impl BuilderError {
    /// Short stable name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            BuilderError::Sequence(_) => "SequenceError",
            BuilderError::Validation(_) => "ValidationError",
            BuilderError::Duplicate(_) => "DuplicateError",
            BuilderError::State(_) => "StateError",
            BuilderError::Contract(_) => "ContractError",
            BuilderError::Config(_) => "ConfigError",
            BuilderError::Initialize(_) => "InitializeError",
        }
    }
}

/// Result alias for builder operations
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Errors produced while serving generated routes
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Not Found - {path}")]
    NotFound { path: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::NotFound { path } => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }

    /// Recover an `ApiError` from a collaborator error
    ///
    /// Data-access modules and auth providers return `anyhow::Error`; an
    /// `ApiError` wrapped inside is kept, anything else is internal.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api,
            Err(other) => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        let mut response = (status, body).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
