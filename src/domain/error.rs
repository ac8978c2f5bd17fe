//! Failure categories surfaced uniformly to callers.

use serde::{Serialize, Serializer};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Closed set of failure categories. The numeric value is what callers see as
/// `error_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigError,
    NetworkError,
    ApiError,
    ValidationError,
    BusinessError,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::ConfigError => 1001,
            ErrorCode::NetworkError => 1002,
            ErrorCode::ApiError => 1003,
            ErrorCode::ValidationError => 1004,
            ErrorCode::BusinessError => 1005,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::BusinessError => "BUSINESS_ERROR",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

/// Errors produced anywhere in the gateway. Every variant maps to exactly one
/// [`ErrorCode`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing or invalid credentials, or an adapter that cannot be initialised.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure or a non-2xx answer without a usable envelope.
    #[error("network error: {0}")]
    Network(String),

    /// The processor rejected a well-formed request.
    #[error("processor rejected request: {0}")]
    Api(String),

    /// Unknown provider or malformed call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Domain-level failure inside an otherwise successful exchange.
    #[error("business error: {0}")]
    Business(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Config(_) => ErrorCode::ConfigError,
            GatewayError::Network(_) => ErrorCode::NetworkError,
            GatewayError::Api(_) => ErrorCode::ApiError,
            GatewayError::Validation(_) => ErrorCode::ValidationError,
            GatewayError::Business(_) => ErrorCode::BusinessError,
        }
    }

    /// The message without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            GatewayError::Config(m)
            | GatewayError::Network(m)
            | GatewayError::Api(m)
            | GatewayError::Validation(m)
            | GatewayError::Business(m) => m,
        }
    }
}

pub const TIMEOUT_MESSAGE: &str = "request timed out";
pub const UNREACHABLE_MESSAGE: &str = "processor unreachable";
pub const TRANSPORT_MESSAGE: &str = "transport failure";

/// Only the kind of failure is kept. The reqwest text names hosts and paths and
/// is logged by the caller instead.
impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            TIMEOUT_MESSAGE
        } else if e.is_connect() {
            UNREACHABLE_MESSAGE
        } else {
            TRANSPORT_MESSAGE
        };
        GatewayError::Network(message.to_string())
    }
}
