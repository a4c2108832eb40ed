//! Quiz API error types.
//!
//! Every failure the client can observe (transport faults, HTTP error
//! responses, poll budget exhaustion, contract violations, cancellation) is
//! normalized into [`ApiError`] at the site where it happens. Callers classify
//! errors through [`ApiError::is_retriable`] and [`ApiError::code`] instead of
//! string matching.

use serde_json::Value;
use thiserror::Error;

/// HTTP status reported for an exhausted poll budget.
pub const POLL_TIMEOUT_STATUS: u16 = 408;

/// Errors that can occur while talking to the quiz backend.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, reset, timeout).
    #[error("network error: {message}")]
    Network { message: String, timed_out: bool },

    /// The caller canceled the operation.
    #[error("request canceled")]
    Canceled,

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<Value>,
    },

    /// The poll loop ran out of its total time budget.
    #[error("quiz generation timed out after {elapsed_ms}ms")]
    PollTimeout { elapsed_ms: u64 },

    /// `POST /quiz/start` succeeded but did not name a session.
    #[error("invalid start response: {0}")]
    InvalidStartResponse(String),

    /// A 2xx response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The action needs a session but none is in progress.
    #[error("no quiz session in progress")]
    NoActiveSession,
}

impl ApiError {
    /// Machine-readable error code.
    ///
    /// Backend domain codes (e.g. `category_not_found`) carried by an HTTP
    /// error body are passed through unchanged.
    pub fn code(&self) -> &str {
        match self {
            ApiError::Network { .. } | ApiError::Canceled => "network_error",
            ApiError::Http { code, .. } => code.as_deref().unwrap_or("http_error"),
            ApiError::PollTimeout { .. } => "poll_timeout",
            ApiError::InvalidStartResponse(_) => "invalid_start_response",
            ApiError::InvalidResponse(_) => "invalid_response",
            ApiError::NoActiveSession => "no_active_session",
        }
    }

    /// HTTP status associated with the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::PollTimeout { .. } => Some(POLL_TIMEOUT_STATUS),
            _ => None,
        }
    }

    /// Returns `true` if the same call may succeed when attempted again
    /// without user intervention.
    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Network { .. } => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Canceled
            | ApiError::PollTimeout { .. }
            | ApiError::InvalidStartResponse(_)
            | ApiError::InvalidResponse(_)
            | ApiError::NoActiveSession => false,
        }
    }

    /// Returns `true` if the error is the result of an intentional cancel.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ApiError::Canceled)
    }

    /// Raw error body returned by the backend, when there was one.
    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Message suitable for showing to the person taking the quiz.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::PollTimeout { .. } => {
                "Generating your quiz is taking too long. Please try again.".to_string()
            }
            ApiError::Network { .. } => "Could not reach the quiz service.".to_string(),
            ApiError::Canceled => "The request was canceled.".to_string(),
            ApiError::NoActiveSession => "Start a quiz first.".to_string(),
            ApiError::InvalidStartResponse(_) | ApiError::InvalidResponse(_) => {
                "The quiz service sent an unexpected response.".to_string()
            }
            ApiError::Http { code, message, .. } => match code.as_deref() {
                Some("category_not_found") => {
                    "We couldn't find a quiz for that category.".to_string()
                }
                _ if message.is_empty() => self.to_string(),
                _ => message.clone(),
            },
        }
    }
}
