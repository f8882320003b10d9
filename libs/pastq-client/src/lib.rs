#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Client for the Past Questions portal API.
//!
//! [`PortalClient`] wraps the session-aware transport stack from
//! `pastq-session` and exposes the backend's endpoint groups:
//!
//! - [`AuthService`]: login, registration, logout, profile and password flows
//! - [`CourseService`]: the course catalogue
//! - [`PastQuestionService`]: browsing, upload, download and moderation
//! - [`UserAdminService`]: account management for administrators
//!
//! Every request carries the stored access token. An expired token is
//! renewed once for all in-flight requests; when renewal fails the session
//! is cleared, the navigator is sent to the login page and callers receive
//! [`ApiError::SessionExpired`].
//!
//! ```ignore
//! use pastq_client::{ClientConfig, PortalClient};
//!
//! let client = PortalClient::from_config(&ClientConfig::default())?;
//! let profile = client.auth().login("10900001", "Secret123").await?;
//! let popular = client.past_questions().popular().await?;
//! ```

mod client;
mod config;
pub mod constants;
mod error;
pub mod helpers;
pub mod models;
mod multipart;
mod services;
pub mod validators;

pub use client::PortalClient;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use multipart::Multipart;
pub use services::{AuthService, CourseService, PastQuestionService, UserAdminService, UserQuery};
pub use validators::ValidationError;

pub use pastq_session::{InAppNavigator, Navigator, Route, SecretString, Session};
