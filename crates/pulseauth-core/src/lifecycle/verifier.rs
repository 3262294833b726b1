//! Bounded-retry verification of a restored credential.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::traits::BackendClient;
use crate::types::{Credential, Principal, Session, Token};

/// Result of [`RetryingVerifier::verify_with_retry`].
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The backend accepted the token.
    Verified(Session),
    /// Retries were exhausted or the backend refused the token.
    Failed(Error),
    /// The cancellation token fired before a result arrived.
    Cancelled,
}

/// Verifies a token, retrying transient failures with linear backoff.
///
/// After the first attempt fails, retry `n` (1-based) waits
/// `base_delay * n`, up to `max_retries` retries. Authoritative refusals
/// are not retried.
pub struct RetryingVerifier {
    backend: Arc<dyn BackendClient>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    base_delay: Duration,
    default_ttl: Duration,
}

impl RetryingVerifier {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        clock: Arc<dyn Clock>,
        max_retries: u32,
        base_delay: Duration,
        default_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            max_retries,
            base_delay,
            default_ttl,
        }
    }

    /// Backoff before retry `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Verify `token`, building a session on success.
    ///
    /// When `principal_hint` is given, the verified principal must carry the
    /// same id. The session's expiry is the lifetime the backend reports;
    /// failing that, `known_expiry` if it is still ahead, and `default_ttl`
    /// only when the real expiry is unknown or already past. Cancellation is
    /// observed both during a request and during backoff; nothing happens
    /// after it fires.
    #[instrument(skip_all, fields(user = principal_hint.map(Principal::username)))]
    pub async fn verify_with_retry(
        &self,
        token: &Token,
        principal_hint: Option<&Principal>,
        known_expiry: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> VerifyOutcome {
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return VerifyOutcome::Cancelled,
                result = self.backend.verify(token) => result,
            };

            let err = match result {
                Ok(verified) => {
                    if let Some(hint) = principal_hint
                        && hint.id() != verified.principal.id()
                    {
                        warn!(
                            expected = hint.id(),
                            actual = verified.principal.id(),
                            "Verified principal does not match stored session"
                        );
                        return VerifyOutcome::Failed(Error::malformed(
                            "verified principal does not match stored session",
                        ));
                    }

                    let now = self.clock.now();
                    return match self.credential(token, now, verified.expires_in, known_expiry) {
                        Ok(credential) => {
                            info!(attempt, "Credential verified");
                            VerifyOutcome::Verified(Session::new(credential, verified.principal))
                        }
                        Err(e) => VerifyOutcome::Failed(Error::malformed(e.to_string())),
                    };
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!(error = %err, "Verification refused");
                return VerifyOutcome::Failed(err);
            }

            if attempt >= self.max_retries {
                warn!(error = %err, attempts = attempt + 1, "Verification retries exhausted");
                return VerifyOutcome::Failed(err);
            }

            attempt += 1;
            let delay = self.backoff(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Verification failed, retrying");

            tokio::select! {
                _ = cancel.cancelled() => return VerifyOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl RetryingVerifier {
    fn credential(
        &self,
        token: &Token,
        now: DateTime<Utc>,
        expires_in: Option<Duration>,
        known_expiry: Option<DateTime<Utc>>,
    ) -> crate::Result<Credential> {
        match (expires_in, known_expiry) {
            (Some(ttl), _) => Credential::with_lifetime(token.clone(), now, ttl),
            (None, Some(expires_at)) if expires_at > now => {
                debug!(%expires_at, "Backend reported no lifetime, keeping stored expiry");
                Credential::new(token.clone(), now, expires_at)
            }
            (None, _) => Credential::with_lifetime(token.clone(), now, self.default_ttl),
        }
    }
}

impl std::fmt::Debug for RetryingVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingVerifier")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}
