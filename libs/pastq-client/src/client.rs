use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use pastq_http::{HttpError, HttpTransport, TransportSecurity};
use pastq_session::{
    FileStore, HttpTokenRefresher, InAppNavigator, MemoryStore, Navigator, RefreshCoordinator,
    Route, Session, SessionAuthLayer, SessionAuthService, SessionStore,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::{Layer, ServiceExt};

use crate::config::ClientConfig;
use crate::error::{ApiError, error_message};
use crate::models::ApiMessage;
use crate::multipart::Multipart;
use crate::services::{AuthService, CourseService, PastQuestionService, UserAdminService};

const JSON: &str = "application/json";

/// Entry point to the portal API.
///
/// Cheap to clone; clones share the connection pool, the session and the
/// refresh coordinator.
#[derive(Clone, Debug)]
pub struct PortalClient {
    service: SessionAuthService<HttpTransport>,
    coordinator: Arc<RefreshCoordinator>,
    base_url: Arc<str>,
    login_path: Arc<str>,
}

impl PortalClient {
    /// Build a client around an explicit store and navigator.
    ///
    /// # Errors
    /// Fails when the transport cannot be built or the base URL is unusable.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpError::InvalidUri {
                url: config.base_url.clone(),
                reason: "base URL must start with http:// or https://".to_owned(),
            }
            .into());
        }
        if base_url.starts_with("http://") && config.http.transport == TransportSecurity::TlsOnly {
            return Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "plain HTTP base URL requires http.transport = allow_insecure_http"
                    .to_owned(),
            }
            .into());
        }

        let transport = HttpTransport::new(config.http.clone())?;
        let refresher = HttpTokenRefresher::new(
            transport.clone(),
            &format!("{base_url}{}", config.refresh_path),
        )?;

        let coordinator = Arc::new(RefreshCoordinator::new(
            Session::new(store),
            Arc::new(refresher),
            navigator,
        ));
        let service = SessionAuthLayer::new(coordinator.clone())
            .with_login_path(&config.login_path)
            .layer(transport);

        tracing::debug!(base_url = %base_url, "portal client ready");
        Ok(Self {
            service,
            coordinator,
            base_url: Arc::from(base_url),
            login_path: Arc::from(config.login_path.as_str()),
        })
    }

    /// Build a client from configuration alone: the session lives in
    /// `session_file` when set, in memory otherwise, and navigation is
    /// tracked in-app starting from the home page.
    ///
    /// # Errors
    /// Fails when the session file is unreadable or corrupt, or as
    /// [`PortalClient::new`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let store: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store, Arc::new(InAppNavigator::new(Route::Home)))
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    #[must_use]
    pub fn courses(&self) -> CourseService<'_> {
        CourseService::new(self)
    }

    #[must_use]
    pub fn past_questions(&self) -> PastQuestionService<'_> {
        PastQuestionService::new(self)
    }

    /// Admin user management.
    #[must_use]
    pub fn users(&self) -> UserAdminService<'_> {
        UserAdminService::new(self)
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        self.coordinator.session()
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        self.coordinator.navigator()
    }

    /// Number of token refreshes performed so far.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.coordinator.refresh_count()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path, None)?).await?;
        decode(&response)
    }

    /// `GET` with `query` encoded as the query string.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn get_json_with<Q, T>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query = serde_urlencoded::to_string(query)?;
        let path = if query.is_empty() {
            path.to_owned()
        } else {
            format!("{path}?{query}")
        };
        self.get_json(&path).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = Bytes::from(serde_json::to_vec(body)?);
        let response = self
            .send(self.request(Method::POST, path, Some((JSON, body)))?)
            .await?;
        decode(&response)
    }

    /// `POST` without a body, answered by an acknowledgement message.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn post_empty(&self, path: &str) -> Result<ApiMessage, ApiError> {
        let response = self.send(self.request(Method::POST, path, None)?).await?;
        Ok(decode_message(&response))
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = Bytes::from(serde_json::to_vec(body)?);
        let response = self
            .send(self.request(Method::PATCH, path, Some((JSON, body)))?)
            .await?;
        decode(&response)
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, path: &str) -> Result<ApiMessage, ApiError> {
        let response = self.send(self.request(Method::DELETE, path, None)?).await?;
        Ok(decode_message(&response))
    }

    /// Raw successful response, for file downloads.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn get_bytes(&self, path: &str) -> Result<Response<Bytes>, ApiError> {
        self.send(self.request(Method::GET, path, None)?).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Multipart,
    ) -> Result<T, ApiError> {
        let content_type = form.content_type();
        let body = form.into_body();
        let response = self
            .send(self.request(Method::POST, path, Some((content_type.as_str(), body)))?)
            .await?;
        decode(&response)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<(&str, Bytes)>,
    ) -> Result<Request<Bytes>, ApiError> {
        let builder = Request::builder()
            .method(method)
            .uri(self.url(path))
            .header(ACCEPT, JSON);
        let request = match body {
            Some((content_type, body)) => builder.header(CONTENT_TYPE, content_type).body(body),
            None => builder.body(Bytes::new()),
        };
        request.map_err(|e| ApiError::Http(HttpError::RequestBuild(e)))
    }

    /// Dispatch through the session stack and turn non-2xx answers into
    /// [`ApiError::Status`].
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ApiError> {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        tracing::debug!(%method, %path, "dispatching request");

        let response = self.service.clone().oneshot(request).await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(%method, %path, status = status.as_u16(), "request completed");
            return Ok(response);
        }

        let message = error_message(status, response.body());
        if status.is_server_error() {
            tracing::warn!(%method, %path, status = status.as_u16(), %message, "request failed");
        } else {
            tracing::debug!(%method, %path, status = status.as_u16(), %message, "request rejected");
        }
        Err(ApiError::Status { status, message })
    }
}

fn decode<T: DeserializeOwned>(response: &Response<Bytes>) -> Result<T, ApiError> {
    let body = response.body();
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    Ok(serde_json::from_slice(body)?)
}

fn decode_message(response: &Response<Bytes>) -> ApiMessage {
    if response.status() == StatusCode::NO_CONTENT {
        return ApiMessage::default();
    }
    serde_json::from_slice(response.body()).unwrap_or_default()
}

/// Creates a client pointing at the given mock server address, with an
/// in-memory session.
#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> (PortalClient, Arc<InAppNavigator>) {
    let nav = Arc::new(InAppNavigator::new(Route::Home));
    let client = PortalClient::new(
        &ClientConfig::for_testing(base_url),
        Arc::new(MemoryStore::new()),
        nav.clone(),
    )
    .unwrap_or_else(|e| panic!("test client: {e}"));
    (client, nav)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pastq_session::SecretString;

    #[test]
    fn rejects_base_url_without_scheme() {
        let cfg = ClientConfig::for_testing("localhost:8000");
        let err = PortalClient::new(
            &cfg,
            Arc::new(MemoryStore::new()),
            Arc::new(InAppNavigator::default()),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Http(HttpError::InvalidUri { .. })));
    }

    #[test]
    fn plain_http_needs_insecure_transport() {
        let mut cfg = ClientConfig::for_testing("http://pq.example.edu");
        cfg.http.transport = TransportSecurity::TlsOnly;
        let err = PortalClient::new(
            &cfg,
            Arc::new(MemoryStore::new()),
            Arc::new(InAppNavigator::default()),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Http(HttpError::InvalidScheme { .. })));
    }

    #[test]
    fn url_keeps_base_path_prefix() {
        let (client, _) = test_client("http://127.0.0.1:8000/api/");
        assert_eq!(client.url("/courses/"), "http://127.0.0.1:8000/api/courses/");
    }

    #[tokio::test]
    async fn non_success_becomes_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/courses/NOPE/");
            then.status(404).body(r#"{"detail":"Not found."}"#);
        });
        let (client, _) = test_client(&server.base_url());

        let err = client
            .get_json::<serde_json::Value>("/courses/NOPE/")
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "Not found.");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_is_encoded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/courses/search/")
                .query_param("q", "data structures");
            then.status(200).body("[]");
        });
        let (client, _) = test_client(&server.base_url());

        let items: Vec<serde_json::Value> = client
            .get_json_with("/courses/search/", &[("q", "data structures")])
            .await
            .unwrap();
        assert!(items.is_empty());
        mock.assert();
    }

    #[tokio::test]
    async fn bearer_is_attached_and_json_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/users/profile/")
                .header("authorization", "Bearer A1")
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"first_name": "Akosua"}));
            then.status(200).body(r#"{"id":1,"first_name":"Akosua"}"#);
        });
        let (client, _) = test_client(&server.base_url());
        client
            .session()
            .save_tokens(&SecretString::new("A1"), &SecretString::new("R1"))
            .unwrap();

        let v: serde_json::Value = client
            .patch_json("/users/profile/", &serde_json::json!({"first_name": "Akosua"}))
            .await
            .unwrap();
        assert_eq!(v["first_name"], "Akosua");
        mock.assert();
    }

    #[tokio::test]
    async fn empty_delete_answer_is_an_empty_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/past-questions/3/");
            then.status(204);
        });
        let (client, _) = test_client(&server.base_url());

        let msg = client.delete("/past-questions/3/").await.unwrap();
        assert_eq!(msg, ApiMessage::default());
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/courses/");
            then.status(200).body("{not json");
        });
        let (client, _) = test_client(&server.base_url());

        let err = client.get_json::<serde_json::Value>("/courses/").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
    }
}
