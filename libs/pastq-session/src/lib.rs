#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Client-side session handling for the Past Questions portal.
//!
//! - [`SessionStore`] keeps the access token, refresh token and cached user
//!   profile across restarts ([`FileStore`]) or in memory ([`MemoryStore`]).
//! - [`SessionAuthLayer`] attaches the bearer token to every request and, on
//!   401, refreshes it once through [`RefreshCoordinator`] before replaying
//!   the request. Concurrent 401s share a single refresh.
//! - When the refresh itself fails the session is cleared and the
//!   [`Navigator`] is sent to [`Route::Login`].

mod coordinator;
mod layer;
mod navigation;
mod refresh;
mod secret;
mod session;
mod store;

pub use coordinator::RefreshCoordinator;
pub use layer::{DEFAULT_LOGIN_PATH, Retried, SessionAuthLayer, SessionAuthService, SessionError, clone_request};
pub use navigation::{InAppNavigator, Navigator, Route, redirect_to_login};
pub use refresh::{DEFAULT_REFRESH_PATH, HttpTokenRefresher, RefreshError, RefreshedTokens, TokenRefresher};
pub use secret::SecretString;
pub use session::Session;
pub use store::{
    ACCESS_TOKEN_KEY, FileStore, MemoryStore, REFRESH_TOKEN_KEY, SessionStore, StoreError, USER_KEY,
};
