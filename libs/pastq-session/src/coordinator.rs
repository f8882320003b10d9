//! Single-flight access-token refresh.
//!
//! Any number of requests may hit 401 at the same moment. The first one to
//! report becomes the leader and calls the [`TokenRefresher`]; the others
//! park on a oneshot channel and receive the leader's outcome. The refresh
//! endpoint is therefore called once per expiry, no matter how many requests
//! were in flight.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::navigation::{Navigator, redirect_to_login};
use crate::refresh::{RefreshError, TokenRefresher};
use crate::secret::SecretString;
use crate::session::Session;

type Outcome = Result<SecretString, RefreshError>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    pending: Vec<oneshot::Sender<Outcome>>,
}

enum Role {
    /// Drive the refresh.
    Leader,
    /// Wait for the leader's outcome.
    Follower(oneshot::Receiver<Outcome>),
    /// The stored token already differs from the one that was rejected.
    Current(SecretString),
}

/// Serializes access-token refreshes for one session.
///
/// Shared between every clone of the session layer through an `Arc`.
pub struct RefreshCoordinator {
    session: Session,
    refresher: Arc<dyn TokenRefresher>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RefreshState>,
    refresh_calls: AtomicUsize,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("waiting", &state.pending.len())
            .field("refresh_calls", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        session: Session,
        refresher: Arc<dyn TokenRefresher>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            session,
            refresher,
            navigator,
            state: Mutex::new(RefreshState::default()),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Number of times the refresher has been invoked.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::Acquire)
    }

    /// Whether a refresh is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Obtain a usable access token after a request sent with `sent_with`
    /// was rejected with 401.
    ///
    /// On failure the session has been cleared and the user sent to the
    /// login surface. A queued caller whose leader was dropped before
    /// finishing claims again, so it either leads a fresh refresh or queues
    /// behind whoever does.
    ///
    /// # Errors
    /// Returns the [`RefreshError`] shared by every request that waited on
    /// the same refresh.
    pub async fn recover(&self, sent_with: Option<&SecretString>) -> Result<SecretString, RefreshError> {
        loop {
            match self.claim(sent_with)? {
                Role::Current(token) => {
                    tracing::debug!("access token already renewed, retrying with current token");
                    return Ok(token);
                }
                Role::Follower(rx) => {
                    tracing::debug!("refresh in flight, queueing request");
                    match rx.await {
                        Ok(Err(RefreshError::Abandoned)) | Err(_) => {
                            tracing::debug!("refresh abandoned, claiming again");
                        }
                        Ok(outcome) => return outcome,
                    }
                }
                Role::Leader => {
                    let mut guard = LeaderGuard {
                        coordinator: self,
                        settled: false,
                    };
                    let outcome = self.run_refresh().await;
                    if let Err(err) = &outcome {
                        self.end_session(err);
                    }
                    guard.settle(&outcome);
                    return outcome;
                }
            }
        }
    }

    /// Decide this caller's role. The flag check and set happen under one
    /// lock acquisition with no await in between.
    fn claim(&self, sent_with: Option<&SecretString>) -> Result<Role, RefreshError> {
        let mut state = self.state.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            return Ok(Role::Follower(rx));
        }

        let current = self
            .session
            .access_token()
            .map_err(|e| RefreshError::Store(e.to_string()))?;
        if let Some(current) = current {
            let stale = sent_with.is_none_or(|sent| !sent.same_as(&current));
            if stale {
                return Ok(Role::Current(current));
            }
        }

        state.refreshing = true;
        Ok(Role::Leader)
    }

    async fn run_refresh(&self) -> Outcome {
        let refresh_token = self
            .session
            .refresh_token()
            .map_err(|e| RefreshError::Store(e.to_string()))?
            .ok_or(RefreshError::MissingRefreshToken)?;

        self.refresh_calls.fetch_add(1, Ordering::AcqRel);
        tracing::info!("access token rejected, refreshing");

        let tokens = self.refresher.refresh(&refresh_token).await?;

        self.session
            .set_access_token(&tokens.access)
            .map_err(|e| RefreshError::Store(e.to_string()))?;
        if let Some(rotated) = &tokens.refresh {
            self.session
                .set_refresh_token(rotated)
                .map_err(|e| RefreshError::Store(e.to_string()))?;
        }

        tracing::info!(rotated = tokens.refresh.is_some(), "access token refreshed");
        Ok(tokens.access)
    }

    fn end_session(&self, err: &RefreshError) {
        tracing::warn!(error = %err, "token refresh failed, ending session");
        if let Err(e) = self.session.clear() {
            tracing::error!(error = %e, "failed to clear session after refresh failure");
        }
        redirect_to_login(self.navigator.as_ref());
    }

    /// Clear the in-flight flag and hand `outcome` to every queued waiter.
    fn release(&self, outcome: &Outcome) {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.pending)
        };
        if !waiters.is_empty() {
            tracing::debug!(count = waiters.len(), ok = outcome.is_ok(), "releasing queued requests");
        }
        for waiter in waiters {
            if waiter.send(outcome.clone()).is_err() {
                tracing::debug!("queued request dropped before refresh settled");
            }
        }
    }
}

/// Ensures queued requests are released even if the leader's future is
/// dropped mid-refresh.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: &Outcome) {
        self.settled = true;
        self.coordinator.release(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("refresh abandoned, waking queued requests");
            self.coordinator.release(&Err(RefreshError::Abandoned));
        }
    }
}
