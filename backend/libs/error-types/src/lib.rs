//! Shared API error envelope
//!
//! Every HTTP-facing service renders failures through [`ErrorResponse`] so
//! clients can branch on `code` and `retryable` without parsing messages.

use serde::{Deserialize, Serialize};

/// Unified API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short HTTP reason ("Not Found", "Conflict", ...)
    pub error: String,

    /// Human readable message
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error category for client-side routing, see [`error_types`]
    pub error_type: String,

    /// Stable machine-readable discriminator, see [`error_codes`]
    pub code: String,

    /// Whether repeating the same request may succeed
    pub retryable: bool,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            retryable: false,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

/// Standard error codes
pub mod error_codes {
    // Request validation
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

    // Recording sessions
    pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
    pub const SESSION_CONFLICT: &str = "SESSION_CONFLICT";
    pub const INVALID_SESSION_STATE: &str = "INVALID_SESSION_STATE";

    // Vendor / object storage
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Standard error categories
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const STATE_ERROR: &str = "state_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "Not Found",
            "Recording session not found",
            404,
            error_types::NOT_FOUND_ERROR,
            error_codes::SESSION_NOT_FOUND,
        );

        assert_eq!(error.status, 404);
        assert_eq!(error.error_type, error_types::NOT_FOUND_ERROR);
        assert_eq!(error.code, error_codes::SESSION_NOT_FOUND);
        assert!(!error.retryable);
    }

    #[test]
    fn test_retryable_flag_serialized() {
        let error = ErrorResponse::new(
            "Service Unavailable",
            "acquire timed out",
            503,
            error_types::SERVICE_UNAVAILABLE_ERROR,
            error_codes::UPSTREAM_UNAVAILABLE,
        )
        .retryable(true);

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["retryable"], true);
        assert_eq!(json["code"], "UPSTREAM_UNAVAILABLE");
        assert!(json["timestamp"].is_string());
    }
}
