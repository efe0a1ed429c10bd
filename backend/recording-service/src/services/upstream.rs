/// Bounded calls to external services
///
/// Every vendor and object-store call goes through [`guarded`]: it enforces
/// the configured deadline, counts the outcome and converts the adapter error
/// into `AppError::UpstreamUnavailable` tagged with the step. A timeout is
/// reported exactly like any other upstream failure.
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, UpstreamStep};
use crate::metrics;

/// Failure reported by an external adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Execute a fallible upstream future with a deadline
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(limit)),
    }
}

/// Bounded call with metrics, logging and error mapping
pub async fn guarded<T, F>(
    step: UpstreamStep,
    session_id: Option<Uuid>,
    limit: Duration,
    call: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match bounded(limit, call).await {
        Ok(value) => {
            metrics::record_upstream_call(step, "ok");
            Ok(value)
        }
        Err(err) => {
            let outcome = if matches!(err, UpstreamError::Timeout(_)) {
                "timeout"
            } else {
                "error"
            };
            metrics::record_upstream_call(step, outcome);
            warn!(
                step = step.as_str(),
                session_id = ?session_id,
                error = %err,
                "upstream call failed"
            );
            Err(AppError::upstream(step, session_id, err))
        }
    }
}
