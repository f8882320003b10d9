#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for the Past Questions portal client
//!
//! This crate provides a hyper-based transport exposed as a [`tower::Service`]:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - Per-request timeout covering the full exchange, body included
//! - User-Agent header injection
//! - Buffered response bodies with a size cap
//!
//! The transport never interprets HTTP statuses: every response, 4xx and 5xx
//! included, comes back as `Ok`. Authentication and status handling live in
//! the layers stacked on top of it.
//!
//! # Example
//!
//! ```ignore
//! use pastq_http::{HttpClientConfig, HttpTransport};
//!
//! let transport = HttpTransport::new(HttpClientConfig::default())?;
//! let request = http::Request::get("https://pq.example.edu/courses/")
//!     .body(bytes::Bytes::new())?;
//! let response = transport.execute(request).await?;
//! ```

mod config;
mod error;
mod transport;

pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity, humantime_serde};
pub use error::HttpError;
pub use transport::HttpTransport;
