//! The auth state machine.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::scheduler::RefreshScheduler;
use super::state::AuthState;
use super::verifier::{RetryingVerifier, VerifyOutcome};
use crate::Result;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Error, InvalidInputError};
use crate::store::SessionStore;
use crate::traits::{AuthGrant, BackendClient, Storage};
use crate::types::{Credential, LoginCredentials, Session, SessionRecord, Token};

/// Owns the single session of this process and drives its lifecycle.
///
/// `AuthManager` is cheap to clone and safe to call from any number of
/// tasks. Entry into `LoggingIn`, `Refreshing` and `Verifying` is a
/// compare-and-set under one lock, so a second initiator never starts a
/// duplicate network call. Every transition that ends a session bumps an
/// epoch; results that arrive for an older epoch are dropped instead of
/// resurrecting the session.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pulseauth_core::{AuthManager, AuthState, BackendClient, MemoryStorage, SessionConfig};
///
/// # async fn example(backend: Arc<dyn BackendClient>) {
/// let manager = AuthManager::new(backend, Arc::new(MemoryStorage::new()), SessionConfig::default());
/// if manager.restore().await == AuthState::LoggedOut {
///     // show the login screen
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn BackendClient>,
    store: SessionStore,
    verifier: RetryingVerifier,
    scheduler: RefreshScheduler,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    core: Mutex<Core>,
    /// Serializes storage writes against termination.
    persist: tokio::sync::Mutex<()>,
    state_tx: watch::Sender<AuthState>,
}

struct Core {
    state: AuthState,
    session: Option<Session>,
    epoch: u64,
    cancel: CancellationToken,
}

/// Proof that the caller won a guarded transition.
struct Ticket {
    epoch: u64,
    cancel: CancellationToken,
}

impl AuthManager {
    /// Create a manager in `LoggedOut` using the system clock.
    ///
    /// Call [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(
        backend: Arc<dyn BackendClient>,
        storage: Arc<dyn Storage>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(backend, storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn BackendClient>,
        storage: Arc<dyn Storage>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let verifier = RetryingVerifier::new(
            backend.clone(),
            clock.clone(),
            config.verify_retries,
            config.verify_base_delay,
            config.default_ttl,
        );
        let (state_tx, _) = watch::channel(AuthState::LoggedOut);

        Self {
            inner: Arc::new(Inner {
                store: SessionStore::new(storage, config.keys.clone()),
                scheduler: RefreshScheduler::new(config.lead_time),
                backend,
                verifier,
                clock,
                config,
                core: Mutex::new(Core {
                    state: AuthState::LoggedOut,
                    session: None,
                    epoch: 0,
                    cancel: CancellationToken::new(),
                }),
                persist: tokio::sync::Mutex::new(()),
                state_tx,
            }),
        }
    }

    /// Current state. Never blocks on network activity.
    pub fn state(&self) -> AuthState {
        self.inner.core().state
    }

    /// Current session, if logged in. Never blocks on network activity.
    pub fn session(&self) -> Option<Session> {
        self.inner.core().session.clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state_tx.subscribe()
    }

    /// Time until the armed refresh timer fires, if one is armed.
    pub fn next_refresh_in(&self) -> Option<Duration> {
        self.inner.scheduler.remaining()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Pick up the persisted session at startup.
    ///
    /// A record that expires more than the lead time from now is trusted
    /// as-is; anything else (expired, expiring soon, or a legacy record with
    /// no expiry) is verified with retries first. Only acts from
    /// `LoggedOut`; otherwise returns the current state untouched.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> AuthState {
        let Ok(ticket) = self
            .inner
            .begin(|s| s == AuthState::LoggedOut, AuthState::Verifying)
        else {
            return self.state();
        };

        let Some(record) = self.inner.store.load().await else {
            debug!("No persisted session");
            self.inner.abandon(&ticket, AuthState::Verifying);
            return self.state();
        };

        let now = self.inner.clock.now();
        if let Some(session) = record.to_session(now)
            && !session
                .credential()
                .expires_within(now, self.inner.config.lead_time)
        {
            info!(user = %session.principal().username(), "Restored persisted session");
            self.inner.establish(&ticket, session, AuthState::Verifying);
            return self.state();
        }

        info!(
            user = %record.principal.username(),
            legacy = record.is_legacy(),
            "Persisted credential expired or expiring, verifying"
        );
        let outcome = self
            .inner
            .verifier
            .verify_with_retry(
                &record.token,
                Some(&record.principal),
                record.expires_at,
                &ticket.cancel,
            )
            .await;

        match outcome {
            VerifyOutcome::Verified(session) => {
                if self.inner.establish(&ticket, session.clone(), AuthState::Verifying) {
                    self.inner.persist(&ticket, &session).await;
                }
            }
            VerifyOutcome::Failed(e) => {
                warn!(error = %e, "Startup verification failed, clearing session");
                self.inner.terminate(&ticket).await;
            }
            VerifyOutcome::Cancelled => debug!("Startup verification abandoned"),
        }
        self.state()
    }

    /// Log in with a username and password.
    ///
    /// Accepted only from `LoggedOut`; a concurrent or repeated call is
    /// rejected with [`Error::Busy`] rather than queued. On failure the
    /// manager returns to `LoggedOut`.
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<Session> {
        if credentials.username().is_empty() || credentials.password().is_empty() {
            return Err(InvalidInputError::Credentials {
                reason: "username and password are required".to_string(),
            }
            .into());
        }

        let ticket = self
            .inner
            .begin(|s| s == AuthState::LoggedOut, AuthState::LoggingIn)
            .map_err(|state| Error::Busy { state })?;

        info!("Logging in");
        let result = tokio::select! {
            _ = ticket.cancel.cancelled() => return Err(Error::Cancelled),
            result = self.inner.backend.login(&credentials) => result,
        };

        let session = match result.and_then(|grant| self.inner.session_from_login(grant)) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.inner.abandon(&ticket, AuthState::LoggingIn);
                return Err(e);
            }
        };

        if !self.inner.establish(&ticket, session.clone(), AuthState::LoggingIn) {
            return Err(Error::Cancelled);
        }
        self.inner.persist(&ticket, &session).await;

        info!(user_id = %session.principal().id(), "Logged in");
        Ok(session)
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Returns `Ok(false)` without any network call when there is no
    /// session or a refresh is already in flight. A failed refresh is not
    /// retried: it ends the session and clears storage.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<bool> {
        let ticket = match self
            .inner
            .begin(|s| s == AuthState::LoggedIn, AuthState::Refreshing)
        {
            Ok(ticket) => ticket,
            Err(state) => {
                debug!(%state, "Refresh skipped");
                return Ok(false);
            }
        };

        let Some(current) = self.session() else {
            self.inner.abandon(&ticket, AuthState::Refreshing);
            return Ok(false);
        };

        info!("Refreshing session");
        let result = tokio::select! {
            _ = ticket.cancel.cancelled() => return Err(Error::Cancelled),
            result = self.inner.backend.refresh(current.token()) => result,
        };

        let renewed = result.and_then(|grant| self.inner.renew(&current, grant));
        let session = match renewed {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Refresh failed, ending session");
                self.inner.terminate(&ticket).await;
                return Err(e);
            }
        };

        if !self.inner.establish(&ticket, session.clone(), AuthState::Refreshing) {
            return Err(Error::Cancelled);
        }
        self.inner.persist(&ticket, &session).await;

        debug!("Session refreshed");
        Ok(true)
    }

    /// End the session from any state.
    ///
    /// The refresh timer is cancelled and in-flight work is abandoned
    /// before this function first yields; storage is cleared after.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.inner.reset();
        info!("Logged out");
        let _guard = self.inner.persist.lock().await;
        self.inner.store.clear().await;
    }

    /// Release the timer and abandon in-flight work, keeping storage.
    ///
    /// Also happens when the last clone of the manager is dropped.
    pub fn shutdown(&self) {
        self.inner.reset();
        debug!("Auth manager shut down");
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: AuthState) {
        self.state_tx.send_replace(state);
    }

    /// Compare-and-set into `next` if `allowed(current)`.
    fn begin(
        &self,
        allowed: impl Fn(AuthState) -> bool,
        next: AuthState,
    ) -> std::result::Result<Ticket, AuthState> {
        let mut core = self.core();
        if !allowed(core.state) {
            return Err(core.state);
        }
        debug!(from = %core.state, to = %next, "Transition");
        core.state = next;
        self.publish(next);
        Ok(Ticket {
            epoch: core.epoch,
            cancel: core.cancel.clone(),
        })
    }

    /// Install `session` and arm the refresh timer, if `ticket` is still
    /// current and the machine is still in `expected`.
    fn establish(self: &Arc<Self>, ticket: &Ticket, session: Session, expected: AuthState) -> bool {
        let mut core = self.core();
        if core.epoch != ticket.epoch || core.state != expected {
            warn!(state = %core.state, "Dropping stale session result");
            return false;
        }

        let weak = Arc::downgrade(self);
        let expires_at = session.credential().expires_at();
        self.scheduler
            .arm(expires_at, self.clock.now(), move || scheduled_refresh(weak));

        core.state = AuthState::LoggedIn;
        core.session = Some(session);
        self.publish(AuthState::LoggedIn);
        true
    }

    /// Return to `LoggedOut` without touching storage.
    fn abandon(&self, ticket: &Ticket, expected: AuthState) {
        let mut core = self.core();
        if core.epoch != ticket.epoch || core.state != expected {
            return;
        }
        Self::end(&mut core, &self.scheduler);
        self.publish(AuthState::LoggedOut);
    }

    /// End the session and clear storage, if `ticket` is still current.
    async fn terminate(&self, ticket: &Ticket) {
        {
            let mut core = self.core();
            if core.epoch != ticket.epoch {
                debug!("Session already ended");
                return;
            }
            Self::end(&mut core, &self.scheduler);
            self.publish(AuthState::LoggedOut);
        }
        let _guard = self.persist.lock().await;
        self.store.clear().await;
    }

    /// Unconditionally end the session in memory.
    fn reset(&self) {
        let mut core = self.core();
        Self::end(&mut core, &self.scheduler);
        self.publish(AuthState::LoggedOut);
    }

    fn end(core: &mut Core, scheduler: &RefreshScheduler) {
        scheduler.cancel();
        core.cancel.cancel();
        core.cancel = CancellationToken::new();
        core.epoch += 1;
        core.state = AuthState::LoggedOut;
        core.session = None;
    }

    /// Write `session` unless the session ended since `ticket` was issued.
    async fn persist(&self, ticket: &Ticket, session: &Session) {
        let _guard = self.persist.lock().await;
        if self.core().epoch != ticket.epoch {
            debug!("Session ended before it was persisted");
            return;
        }
        self.store.save(&SessionRecord::from_session(session)).await;
    }

    fn session_from_login(&self, grant: AuthGrant) -> Result<Session> {
        let principal = grant
            .principal
            .ok_or_else(|| Error::malformed("login response has no user"))?;
        let credential = self.credential_from(grant.token, grant.expires_in)?;
        Ok(Session::new(credential, principal))
    }

    fn renew(&self, current: &Session, grant: AuthGrant) -> Result<Session> {
        if let Some(ref principal) = grant.principal
            && principal.id() != current.principal().id()
        {
            return Err(Error::malformed(format!(
                "refresh returned principal {} for session of {}",
                principal.id(),
                current.principal().id()
            )));
        }
        let credential = self.credential_from(grant.token, grant.expires_in)?;
        let mut session = current.clone();
        session.renew(credential, grant.principal);
        Ok(session)
    }

    fn credential_from(
        &self,
        token: Token,
        expires_in: Option<Duration>,
    ) -> Result<Credential> {
        let ttl = expires_in.unwrap_or(self.config.default_ttl);
        Credential::with_lifetime(token, self.clock.now(), ttl)
            .map_err(|e| Error::malformed(e.to_string()))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(|e| e.into_inner());
        core.cancel.cancel();
        self.scheduler.cancel();
    }
}

async fn scheduled_refresh(inner: Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let manager = AuthManager { inner };
    if let Err(e) = manager.refresh().await {
        debug!(error = %e, "Scheduled refresh ended the session");
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
