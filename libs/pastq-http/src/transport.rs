use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Future returned by [`HttpTransport`] when used as a tower service.
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<Response<Bytes>, HttpError>> + Send>>;

/// Pooled HTTP transport with buffered bodies.
///
/// `HttpTransport` is `Clone + Send + Sync`; clones share the connection pool.
/// Requests and responses carry their bodies as [`Bytes`], which keeps
/// requests cheap to copy for a retry.
#[derive(Clone)]
pub struct HttpTransport {
    client: HyperClient,
    settings: Arc<Settings>,
}

struct Settings {
    user_agent: HeaderValue,
    request_timeout: Duration,
    max_body_size: usize,
    transport: TransportSecurity,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("request_timeout", &self.settings.request_timeout)
            .field("max_body_size", &self.settings.max_body_size)
            .field("transport", &self.settings.transport)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport from the given configuration.
    ///
    /// # Errors
    /// Returns [`HttpError::Tls`] if the TLS connector cannot be initialized
    /// and [`HttpError::InvalidHeaderValue`] for an unusable User-Agent.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only against local backends"
            );
        }

        let https = build_https_connector(config.transport)?;

        let mut builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle) = config.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }
        let client = builder.build::<_, Full<Bytes>>(https);

        let settings = Settings {
            user_agent: HeaderValue::from_str(&config.user_agent)?,
            request_timeout: config.request_timeout,
            max_body_size: config.max_body_size,
            transport: config.transport,
        };

        Ok(Self {
            client,
            settings: Arc::new(settings),
        })
    }

    /// Send one request and buffer the response.
    ///
    /// Returns `Ok` for every HTTP status.
    ///
    /// # Errors
    /// Fails on invalid or disallowed URLs, transport failures, timeouts and
    /// bodies larger than the configured limit.
    pub async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        self.check_uri(request.uri())?;

        let (mut parts, body) = request.into_parts();
        if !parts.headers.contains_key(USER_AGENT) {
            parts
                .headers
                .insert(USER_AGENT, self.settings.user_agent.clone());
        }
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let request = Request::from_parts(parts, Full::new(body));

        let timeout = self.settings.request_timeout;
        let limit = self.settings.max_body_size;
        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let collected = Limited::new(body, limit).collect().await.map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    HttpError::BodyTooLarge { limit }
                } else {
                    HttpError::Transport(e)
                }
            })?;
            Ok::<_, HttpError>(Response::from_parts(parts, collected.to_bytes()))
        };

        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| HttpError::Timeout(timeout))??;

        tracing::debug!(
            %method,
            %uri,
            status = response.status().as_u16(),
            bytes = response.body().len(),
            "http exchange completed"
        );
        Ok(response)
    }

    fn check_uri(&self, uri: &http::Uri) -> Result<(), HttpError> {
        let Some(scheme) = uri.scheme_str() else {
            return Err(HttpError::InvalidUri {
                url: uri.to_string(),
                reason: "URL must be absolute (scheme and host required)".to_owned(),
            });
        };
        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: uri.to_string(),
                reason: "URL has no host".to_owned(),
            });
        }
        match (scheme, self.settings.transport) {
            ("https", _) | ("http", TransportSecurity::AllowInsecureHttp) => Ok(()),
            ("http", TransportSecurity::TlsOnly) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "plain HTTP requires TransportSecurity::AllowInsecureHttp".to_owned(),
            }),
            (other, _) => Err(HttpError::InvalidScheme {
                scheme: other.to_owned(),
                reason: "only http and https are supported".to_owned(),
            }),
        }
    }
}

impl Service<Request<Bytes>> for HttpTransport {
    type Response = Response<Bytes>;
    type Error = HttpError;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.execute(request).await })
    }
}

/// Get the crypto provider for TLS connections.
///
/// Uses the globally installed provider when there is one, otherwise an
/// aws-lc-rs provider that is not installed globally.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| HttpError::Tls(Box::new(e)))?;
    let connector = if transport == TransportSecurity::AllowInsecureHttp {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    };
    Ok(connector)
}
