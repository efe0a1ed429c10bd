/// Error types for Recording Service
///
/// `AppError` is the taxonomy every orchestrator operation reports. Each kind
/// renders to a distinct `code` so callers can tell retry-safe failures
/// (`UPSTREAM_UNAVAILABLE`) from ones that will never succeed as sent.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use error_types::{error_codes, error_types as kinds, ErrorResponse};
use std::fmt;
use uuid::Uuid;

/// Result type for recording-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Which external call a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStep {
    Acquire,
    MintToken,
    Start,
    Stop,
    Query,
    ListObjects,
    SignUrl,
}

impl UpstreamStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::MintToken => "mint_token",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Query => "query",
            Self::ListObjects => "list_objects",
            Self::SignUrl => "sign_url",
        }
    }
}

impl fmt::Display for UpstreamStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad caller input; nothing was attempted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate external identifier
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not valid for the session's lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Remote call failed or timed out
    #[error("{}", describe_upstream(.step, .session_id, .message))]
    UpstreamUnavailable {
        step: UpstreamStep,
        session_id: Option<Uuid>,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_upstream(step: &UpstreamStep, session_id: &Option<Uuid>, message: &str) -> String {
    match session_id {
        Some(id) => format!("Upstream unavailable during {step} (session {id}): {message}"),
        None => format!("Upstream unavailable during {step}: {message}"),
    }
}

impl AppError {
    pub fn upstream(step: UpstreamStep, session_id: Option<Uuid>, err: impl fmt::Display) -> Self {
        AppError::UpstreamUnavailable {
            step,
            session_id,
            message: err.to_string(),
        }
    }

    pub fn session_not_found(id: Uuid) -> Self {
        AppError::NotFound(format!("recording session {id}"))
    }

    /// Whether the same request may succeed when repeated later
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => error_codes::INVALID_ARGUMENT,
            AppError::NotFound(_) => error_codes::SESSION_NOT_FOUND,
            AppError::Conflict(_) => error_codes::SESSION_CONFLICT,
            AppError::InvalidState(_) => error_codes::INVALID_SESSION_STATE,
            AppError::UpstreamUnavailable { .. } => error_codes::UPSTREAM_UNAVAILABLE,
            AppError::DatabaseError(_) => error_codes::DATABASE_ERROR,
            AppError::Internal(_) => error_codes::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            AppError::InvalidArgument(_) => kinds::VALIDATION_ERROR,
            AppError::NotFound(_) => kinds::NOT_FOUND_ERROR,
            AppError::Conflict(_) => kinds::CONFLICT_ERROR,
            AppError::InvalidState(_) => kinds::STATE_ERROR,
            AppError::UpstreamUnavailable { .. } => kinds::SERVICE_UNAVAILABLE_ERROR,
            AppError::DatabaseError(_) | AppError::Internal(_) => kinds::SERVER_ERROR,
        };

        let response = ErrorResponse::new(
            status.canonical_reason().unwrap_or("Error"),
            &self.to_string(),
            status.as_u16(),
            error_type,
            self.code(),
        )
        .retryable(self.is_retryable());

        HttpResponse::build(status).json(response)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // PostgreSQL unique violation
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(db_err.message().to_string());
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}
