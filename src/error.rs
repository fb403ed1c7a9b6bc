use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Stable, machine-readable error codes returned in every error body.
pub mod error_code {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const INVALID_PARAMETERS: &str = "INVALID_PARAMETERS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const CAPACITY_EXCEEDED: &str = "CAPACITY_EXCEEDED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

/// Error type for catalog operations and code allocation.
///
/// Store implementations return `anyhow::Result`; a `ServiceError` raised
/// inside a store travels through `anyhow` and is recovered intact by the
/// `From<anyhow::Error>` conversion below. Anything else becomes `Storage`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Bad or inconsistent input. HTTP 400.
    #[error("{0}")]
    InvalidInput(String),

    /// Referenced record does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Unique key already taken. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// The 5-digit sequence of a subgroup is used up. HTTP 409.
    #[error("no codes remain for subgroup {group_code}.{subgroup_code}")]
    CapacityExceeded {
        group_code: String,
        subgroup_code: String,
    },

    /// Backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => error_code::INVALID_INPUT,
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::CapacityExceeded { .. } => error_code::CAPACITY_EXCEEDED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(service_error) => service_error,
            Err(other) => ServiceError::Storage(format!("{:#}", other)),
        }
    }
}

/// Error type of the price derivation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Negative cost or percentage, unknown billing entity. HTTP 400.
    #[error("{0}")]
    InvalidInput(String),

    /// Commission and tax leave no room for a positive price. HTTP 422.
    #[error("{0}")]
    InvalidParameters(String),
}

impl PricingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            PricingError::InvalidInput(_) => error_code::INVALID_INPUT,
            PricingError::InvalidParameters(_) => error_code::INVALID_PARAMETERS,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PricingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PricingError::InvalidParameters(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = serde_json::json!({
        "code": code,
        "error": message,
    });
    (status, axum::Json(body)).into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Storage(message) = &self {
            log::error!("Storage failure: {}", message);
        }
        error_body(self.status_code(), self.error_code(), self.to_string())
    }
}

impl IntoResponse for PricingError {
    fn into_response(self) -> Response {
        error_body(self.status_code(), self.error_code(), self.to_string())
    }
}
