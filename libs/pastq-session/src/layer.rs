use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, Response, StatusCode};
use pastq_http::HttpError;
use thiserror::Error;
use tower::{Layer, Service, ServiceExt};

use crate::coordinator::RefreshCoordinator;
use crate::refresh::RefreshError;
use crate::secret::SecretString;
use crate::store::StoreError;

/// Path fragment identifying the login endpoint. A 401 from it means bad
/// credentials, not an expired session.
pub const DEFAULT_LOGIN_PATH: &str = "/users/login/";

/// Request extension marking a request that has already been replayed
/// after a refresh. A marked request is never retried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retried;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("session expired: {0}")]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tower layer that authenticates requests with the stored access token and
/// recovers from expired tokens.
///
/// Every request gets `Authorization: Bearer <access>` when a token is
/// stored. A 401 answer triggers a refresh through the shared
/// [`RefreshCoordinator`], after which the request is replayed once with the
/// new token. Concurrent 401s wait for the same refresh.
#[derive(Clone, Debug)]
pub struct SessionAuthLayer {
    coordinator: Arc<RefreshCoordinator>,
    login_path: Arc<str>,
}

impl SessionAuthLayer {
    #[must_use]
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            coordinator,
            login_path: Arc::from(DEFAULT_LOGIN_PATH),
        }
    }

    /// Override the login path fragment exempted from refresh handling.
    #[must_use]
    pub fn with_login_path(mut self, login_path: &str) -> Self {
        self.login_path = Arc::from(login_path);
        self
    }
}

impl<S> Layer<S> for SessionAuthLayer {
    type Service = SessionAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionAuthService {
            inner,
            coordinator: self.coordinator.clone(),
            login_path: self.login_path.clone(),
        }
    }
}

/// Created by [`SessionAuthLayer`].
#[derive(Clone, Debug)]
pub struct SessionAuthService<S> {
    inner: S,
    coordinator: Arc<RefreshCoordinator>,
    login_path: Arc<str>,
}

impl<S> Service<Request<Bytes>> for SessionAuthService<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = SessionError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Bytes>, SessionError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(SessionError::from)
    }

    fn call(&mut self, mut req: Request<Bytes>) -> Self::Future {
        // Clone-swap: the readied service goes into the future.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let coordinator = self.coordinator.clone();
        let login_path = self.login_path.clone();

        Box::pin(async move {
            let sent_with = coordinator.session().access_token()?;
            if let Some(token) = &sent_with {
                set_bearer(&mut req, token)?;
            }

            let replay = is_recoverable(&req, &login_path).then(|| clone_request(&req));

            let response = inner.call(req).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            let Some(mut replay) = replay else {
                return Ok(response);
            };

            let token = coordinator.recover(sent_with.as_ref()).await?;

            replay.extensions_mut().insert(Retried);
            set_bearer(&mut replay, &token)?;
            tracing::debug!(method = %replay.method(), uri = %replay.uri(), "replaying request with renewed token");

            let response = inner.ready().await?.call(replay).await?;
            Ok(response)
        })
    }
}

fn is_recoverable(req: &Request<Bytes>, login_path: &str) -> bool {
    req.extensions().get::<Retried>().is_none() && !req.uri().path().contains(login_path)
}

fn set_bearer(req: &mut Request<Bytes>, token: &SecretString) -> Result<(), HttpError> {
    let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose()));
    let mut value = HeaderValue::from_str(&raw)?;
    value.set_sensitive(true);
    req.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Copy a buffered request so it can be sent again.
///
/// Method, URI, version, headers and body are copied. Of the extensions
/// only the [`Retried`] marker is carried over.
#[must_use]
pub fn clone_request(req: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(req.body().clone());
    *copy.method_mut() = req.method().clone();
    *copy.uri_mut() = req.uri().clone();
    *copy.version_mut() = req.version();
    *copy.headers_mut() = req.headers().clone();
    if let Some(marker) = req.extensions().get::<Retried>() {
        copy.extensions_mut().insert(*marker);
    }
    copy
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::navigation::{InAppNavigator, Navigator, Route};
    use crate::refresh::{RefreshedTokens, TokenRefresher};
    use crate::session::Session;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use http::Method;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedRefresher {
        result: Result<RefreshedTokens, RefreshError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for FixedRefresher {
        async fn refresh(&self, _: &SecretString) -> Result<RefreshedTokens, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    struct Harness {
        coordinator: Arc<RefreshCoordinator>,
        refresher: Arc<FixedRefresher>,
        nav: Arc<InAppNavigator>,
    }

    fn harness(result: Result<RefreshedTokens, RefreshError>) -> Harness {
        delayed_harness(result, Duration::ZERO)
    }

    fn delayed_harness(result: Result<RefreshedTokens, RefreshError>, delay: Duration) -> Harness {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session
            .save_tokens(&SecretString::new("A1"), &SecretString::new("R1"))
            .unwrap();
        let refresher = Arc::new(FixedRefresher {
            result,
            delay,
            calls: AtomicUsize::new(0),
        });
        let nav = Arc::new(InAppNavigator::new(Route::Dashboard));
        let coordinator = Arc::new(RefreshCoordinator::new(
            session,
            refresher.clone(),
            nav.clone(),
        ));
        Harness {
            coordinator,
            refresher,
            nav,
        }
    }

    fn renewed() -> Result<RefreshedTokens, RefreshError> {
        Ok(RefreshedTokens {
            access: SecretString::new("A2"),
            refresh: None,
        })
    }

    fn respond(status: StatusCode, body: &'static str) -> Response<Bytes> {
        let mut resp = Response::new(Bytes::from_static(body.as_bytes()));
        *resp.status_mut() = status;
        resp
    }

    /// Backend stub accepting only `Bearer A2`; records every Authorization
    /// header it sees.
    fn backend(
        seen: Arc<Mutex<Vec<Option<String>>>>,
    ) -> impl Service<Request<Bytes>, Response = Response<Bytes>, Error = HttpError, Future: Send>
    + Clone
    + Send
    + 'static {
        tower::service_fn(move |req: Request<Bytes>| {
            let seen = seen.clone();
            async move {
                let auth = req
                    .headers()
                    .get(AUTHORIZATION)
                    .map(|v| v.to_str().unwrap().to_owned());
                let ok = auth.as_deref() == Some("Bearer A2");
                seen.lock().push(auth);
                Ok::<_, HttpError>(if ok {
                    respond(StatusCode::OK, "ok")
                } else {
                    respond(StatusCode::UNAUTHORIZED, "expired")
                })
            }
        })
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::get(format!("http://portal.test{path}"))
            .body(Bytes::new())
            .unwrap()
    }

    #[test]
    fn layer_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<SessionAuthLayer>();
    }

    #[tokio::test]
    async fn attaches_stored_token_as_sensitive_header() {
        let h = harness(renewed());
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(tower::service_fn(
            |req: Request<Bytes>| async move {
                let auth = req.headers().get(AUTHORIZATION).unwrap();
                assert!(auth.is_sensitive());
                assert_eq!(auth, "Bearer A1");
                Ok::<_, HttpError>(respond(StatusCode::OK, "ok"))
            },
        ));

        let resp = svc.oneshot(get("/courses/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn anonymous_request_has_no_authorization() {
        let h = harness(renewed());
        h.coordinator.session().clear().unwrap();
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(tower::service_fn(
            |req: Request<Bytes>| async move {
                assert!(req.headers().get(AUTHORIZATION).is_none());
                Ok::<_, HttpError>(respond(StatusCode::OK, "[]"))
            },
        ));

        svc.oneshot(get("/courses/")).await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_replayed() {
        let h = harness(renewed());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(backend(seen.clone()));

        let resp = svc.oneshot(get("/users/profile/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_ref(), b"ok");
        assert_eq!(
            *seen.lock(),
            vec![Some("Bearer A1".to_owned()), Some("Bearer A2".to_owned())]
        );
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replay_keeps_method_headers_and_body() {
        let h = harness(renewed());
        let attempts = Arc::new(AtomicUsize::new(0));
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(tower::service_fn({
            let attempts = attempts.clone();
            move |req: Request<Bytes>| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert_eq!(req.method(), Method::POST);
                    assert_eq!(req.headers()["content-type"], "application/json");
                    assert_eq!(req.body().as_ref(), br#"{"title":"x"}"#);
                    if attempt == 0 {
                        assert!(req.extensions().get::<Retried>().is_none());
                        Ok::<_, HttpError>(respond(StatusCode::UNAUTHORIZED, ""))
                    } else {
                        assert!(req.extensions().get::<Retried>().is_some());
                        Ok(respond(StatusCode::CREATED, "{}"))
                    }
                }
            }
        }));

        let req = Request::post("http://portal.test/courses/")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"title":"x"}"#))
            .unwrap();
        let resp = svc.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn renewed_token_is_stored_before_any_replay_is_sent() {
        let h = delayed_harness(renewed(), Duration::from_millis(50));
        let stored_at_replay = Arc::new(Mutex::new(Vec::new()));
        let backend = tower::service_fn({
            let coordinator = h.coordinator.clone();
            let stored_at_replay = stored_at_replay.clone();
            move |req: Request<Bytes>| {
                let coordinator = coordinator.clone();
                let stored_at_replay = stored_at_replay.clone();
                async move {
                    if req.extensions().get::<Retried>().is_none() {
                        return Ok::<_, HttpError>(respond(StatusCode::UNAUTHORIZED, "expired"));
                    }
                    let stored = coordinator.session().access_token().unwrap().unwrap();
                    let sent = req.headers()[AUTHORIZATION].to_str().unwrap().to_owned();
                    stored_at_replay.lock().push((stored.expose().to_owned(), sent));
                    Ok(respond(StatusCode::OK, "ok"))
                }
            }
        });
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(backend);

        let results = futures::future::join_all(
            (0..3).map(|_| svc.clone().oneshot(get("/past-questions/my-uploads/"))),
        )
        .await;

        for r in results {
            assert_eq!(r.unwrap().status(), StatusCode::OK);
        }
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        let observed = stored_at_replay.lock();
        assert_eq!(observed.len(), 3);
        for (stored, sent) in observed.iter() {
            assert_eq!(stored, "A2");
            assert_eq!(sent, "Bearer A2");
        }
    }

    #[tokio::test]
    async fn login_401_passes_through_untouched() {
        let h = harness(renewed());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(backend(seen.clone()));

        let resp = svc.oneshot(get("/users/login/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.nav.current(), Route::Dashboard);
        assert!(h.coordinator.session().is_authenticated());
    }

    #[tokio::test]
    async fn second_401_is_returned_without_another_refresh() {
        let h = harness(renewed());
        let attempts = Arc::new(AtomicUsize::new(0));
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(tower::service_fn({
            let attempts = attempts.clone();
            move |_req: Request<Bytes>| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, HttpError>(respond(StatusCode::UNAUTHORIZED, "still no")) }
            }
        }));

        let resp = svc.oneshot(get("/past-questions/pending/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_as_error_and_ends_session() {
        let h = harness(Err(RefreshError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: "token_not_valid".to_owned(),
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(backend(seen.clone()));

        let err = svc.oneshot(get("/users/profile/")).await.unwrap_err();

        assert!(matches!(err, SessionError::Refresh(RefreshError::Rejected { .. })), "got {err:?}");
        assert_eq!(seen.lock().len(), 1);
        assert!(!h.coordinator.session().is_authenticated());
        assert_eq!(h.nav.current(), Route::Login);
    }

    #[tokio::test]
    async fn non_401_errors_are_untouched() {
        let h = harness(renewed());
        let svc = SessionAuthLayer::new(h.coordinator.clone()).layer(tower::service_fn(
            |_req: Request<Bytes>| async {
                Ok::<_, HttpError>(respond(StatusCode::FORBIDDEN, "nope"))
            },
        ));

        let resp = svc.oneshot(get("/past-questions/pending/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clone_request_copies_everything_but_foreign_extensions() {
        #[derive(Clone)]
        struct Other;

        let mut req = Request::put("http://portal.test/courses/CS101/")
            .header("x-trace", "1")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        req.extensions_mut().insert(Retried);
        req.extensions_mut().insert(Other);

        let copy = clone_request(&req);
        assert_eq!(copy.method(), Method::PUT);
        assert_eq!(copy.uri(), req.uri());
        assert_eq!(copy.headers()["x-trace"], "1");
        assert_eq!(copy.body(), req.body());
        assert!(copy.extensions().get::<Retried>().is_some());
        assert!(copy.extensions().get::<Other>().is_none());
    }
}
