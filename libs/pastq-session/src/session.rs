use std::fmt;
use std::sync::Arc;

use crate::secret::SecretString;
use crate::store::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStore, StoreError, USER_KEY,
};

/// Typed view over the session keys of a [`SessionStore`].
///
/// `Session` is cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Propagates store read failures.
    pub fn access_token(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self.store.get(ACCESS_TOKEN_KEY)?.map(SecretString::new))
    }

    /// # Errors
    /// Propagates store read failures.
    pub fn refresh_token(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self.store.get(REFRESH_TOKEN_KEY)?.map(SecretString::new))
    }

    /// Persist a freshly issued token pair (login / registration).
    ///
    /// # Errors
    /// Propagates store write failures.
    pub fn save_tokens(
        &self,
        access: &SecretString,
        refresh: &SecretString,
    ) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, access.expose())?;
        self.store.set(REFRESH_TOKEN_KEY, refresh.expose())
    }

    /// # Errors
    /// Propagates store write failures.
    pub fn set_access_token(&self, access: &SecretString) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, access.expose())
    }

    /// # Errors
    /// Propagates store write failures.
    pub fn set_refresh_token(&self, refresh: &SecretString) -> Result<(), StoreError> {
        self.store.set(REFRESH_TOKEN_KEY, refresh.expose())
    }

    /// Cached user profile, serialized as JSON.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub fn user_json(&self) -> Result<Option<String>, StoreError> {
        self.store.get(USER_KEY)
    }

    /// # Errors
    /// Propagates store write failures.
    pub fn set_user_json(&self, json: &str) -> Result<(), StoreError> {
        self.store.set(USER_KEY, json)
    }

    /// Destroy the session: tokens and cached profile alike.
    ///
    /// # Errors
    /// Propagates store write failures.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    /// Whether an access token is stored. Read failures count as "no".
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.get(ACCESS_TOKEN_KEY), Ok(Some(_)))
    }
}
