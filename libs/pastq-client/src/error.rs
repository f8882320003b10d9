use http::StatusCode;
use pastq_http::HttpError;
use pastq_session::{RefreshError, SessionError, StoreError};
use thiserror::Error;

use crate::validators::ValidationError;

/// Errors returned by the portal client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The login endpoint refused the credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The access token could not be renewed. The session has been cleared
    /// and the navigator sent to the login page.
    #[error("session expired, please log in again ({0})")]
    SessionExpired(#[source] RefreshError),

    /// Non-2xx answer from the backend.
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Input rejected before anything was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to encode query string: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Http(e) => ApiError::Http(e),
            SessionError::Refresh(e) => ApiError::SessionExpired(e),
            SessionError::Store(e) => ApiError::Store(e),
            other => ApiError::Http(HttpError::Transport(Box::new(other))),
        }
    }
}

impl ApiError {
    /// HTTP status of a backend rejection, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the user has to log in again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_) | ApiError::InvalidCredentials(_))
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at the usual `detail` / `error` / `msg` / `message` keys first,
/// then at the first field error (`{"email": ["already taken"]}`), then at a
/// bare list of messages. Falls back to the status reason.
pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    };

    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        return if text.is_empty() || text.starts_with('<') {
            fallback()
        } else {
            text.chars().take(200).collect()
        };
    };

    match &value {
        serde_json::Value::Object(map) => {
            for key in ["detail", "error", "msg", "message"] {
                if let Some(msg) = map.get(key).and_then(first_text) {
                    return msg;
                }
            }
            map.iter()
                .find_map(|(field, v)| {
                    first_text(v).map(|msg| {
                        if field == "non_field_errors" {
                            msg
                        } else {
                            format!("{field}: {msg}")
                        }
                    })
                })
                .unwrap_or_else(fallback)
        }
        other => first_text(other).unwrap_or_else(fallback),
    }
}

fn first_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}
