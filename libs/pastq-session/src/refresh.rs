use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, StatusCode, Uri};
use pastq_http::{HttpError, HttpTransport};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret::SecretString;

/// Default path of the token refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/api/token/refresh/";

const ERROR_PREVIEW_LIMIT: usize = 256;

/// Why an access token could not be renewed.
///
/// Cloneable so one outcome can be handed to every request that waited on
/// the same refresh. Never carries token values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-2xx status (typically 401
    /// when the refresh token has expired too).
    #[error("refresh rejected with HTTP {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("refresh transport failure: {0}")]
    Transport(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// No refresh token is stored; the session cannot be recovered.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The task driving the refresh was dropped before it finished.
    #[error("refresh abandoned before completion")]
    Abandoned,

    #[error("session store failure during refresh: {0}")]
    Store(String),
}

/// Tokens issued by a successful refresh.
///
/// `refresh` is set when the backend rotates refresh tokens.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access: SecretString,
    pub refresh: Option<SecretString>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedTokens, RefreshError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Deserialize-only so tokens cannot be serialized into logs by accident.
#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Refresher calling the backend refresh endpoint with
/// `{"refresh": "<token>"}` and reading `access` (and a rotated `refresh`,
/// if any) from the JSON answer.
///
/// Talks to the bare transport: refresh calls never pass through the
/// session layer, so they are never themselves retried or queued.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    transport: HttpTransport,
    endpoint: Uri,
}

impl HttpTokenRefresher {
    /// # Errors
    /// Returns [`HttpError::InvalidUri`] when `endpoint` is not a valid URL.
    pub fn new(transport: HttpTransport, endpoint: &str) -> Result<Self, HttpError> {
        let endpoint = endpoint.parse::<Uri>().map_err(|e| HttpError::InvalidUri {
            url: endpoint.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            transport,
            endpoint,
        })
    }

    fn build_request(&self, refresh_token: &SecretString) -> Result<Request<Bytes>, RefreshError> {
        let body = serde_json::to_vec(&RefreshRequest {
            refresh: refresh_token.expose(),
        })
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Bytes::from(body))
            .map_err(|e| RefreshError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedTokens, RefreshError> {
        let request = self.build_request(refresh_token)?;

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status,
                message: preview(response.body()),
            });
        }

        let parsed: RefreshResponse = serde_json::from_slice(response.body())
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if parsed.access.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "empty access token".to_owned(),
            ));
        }

        Ok(RefreshedTokens {
            access: SecretString::new(parsed.access),
            refresh: parsed.refresh.filter(|r| !r.is_empty()).map(SecretString::new),
        })
    }
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut end = text.len().min(ERROR_PREVIEW_LIMIT);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim().to_owned()
}
