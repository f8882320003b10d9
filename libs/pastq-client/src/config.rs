use std::path::PathBuf;

use pastq_http::{HttpClientConfig, TransportSecurity};
use pastq_session::{DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH};
use serde::{Deserialize, Serialize};

/// Backend used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Portal client settings.
///
/// Every field has a default, so an empty YAML document or an empty
/// environment yields a working local configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend origin, optionally with a path prefix. No trailing slash needed.
    pub base_url: String,

    /// Path of the login endpoint. 401s from it never trigger a refresh.
    pub login_path: String,

    /// Path of the token refresh endpoint.
    pub refresh_path: String,

    /// Transport settings. Plain HTTP is accepted by default because the
    /// default backend is a local development server; set
    /// `http.transport: tls_only` for deployed backends.
    pub http: HttpClientConfig,

    /// Where the session is persisted. `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            http: HttpClientConfig {
                transport: TransportSecurity::AllowInsecureHttp,
                ..HttpClientConfig::default()
            },
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for tests against a local mock server: plain HTTP
    /// allowed, short timeouts, in-memory session.
    #[must_use]
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: HttpClientConfig::for_testing(),
            ..Self::default()
        }
    }
}
