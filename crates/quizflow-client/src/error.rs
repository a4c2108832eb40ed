//! Mapping of transport failures and error bodies onto [`ApiError`].

use serde::Deserialize;
use serde_json::Value;

use quizflow_core::error::ApiError;

/// Error bodies come in a few shapes:
/// `{"detail": "text"}`, `{"detail": {"code", "message"}}`,
/// `{"code", "message"}` or `{"error": "text"}`. Top-level fields of any
/// other type are ignored rather than failing the whole body.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    detail: Option<ErrorDetail>,
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Structured {
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        message: Option<Value>,
    },
    Other(Value),
}

/// Build the error for a non-2xx response.
pub(crate) fn http_error(status: u16, body: &[u8]) -> ApiError {
    let details = serde_json::from_slice::<Value>(body).ok();
    let parsed = details
        .as_ref()
        .and_then(|v| ErrorBody::deserialize(v).ok())
        .unwrap_or_default();

    let (detail_code, detail_message) = match parsed.detail {
        Some(ErrorDetail::Text(message)) => (None, Some(message)),
        Some(ErrorDetail::Structured { code, message }) => (text(code), text(message)),
        Some(ErrorDetail::Other(_)) | None => (None, None),
    };

    let code = detail_code.or_else(|| text(parsed.code));
    let message = detail_message
        .or_else(|| text(parsed.message))
        .or_else(|| text(parsed.error))
        .or_else(|| {
            // Plain-text bodies are kept verbatim.
            if details.is_none() && !body.is_empty() {
                Some(String::from_utf8_lossy(body).trim().to_string())
            } else {
                None
            }
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        });

    ApiError::Http {
        status,
        code,
        message,
        details,
    }
}

/// Build the error for a request that produced no response.
pub(crate) fn network_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Network {
            message: format!("request timed out: {err}"),
            timed_out: true,
        }
    } else if err.is_connect() {
        ApiError::Network {
            message: format!("could not connect: {err}"),
            timed_out: false,
        }
    } else {
        ApiError::Network {
            message: err.to_string(),
            timed_out: false,
        }
    }
}
