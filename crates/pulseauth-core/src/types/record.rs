//! Persisted form of a session.

use chrono::{DateTime, Utc};

use super::{Credential, Principal, Session, Token};

/// What the session store reads and writes.
///
/// Records restored from the legacy two-key layout carry no expiry, which
/// the lifecycle treats as "unknown, verify now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: Token,
    pub principal: Principal,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Record for a live session.
    pub fn from_session(session: &Session) -> Self {
        let credential = session.credential();
        Self {
            token: credential.token().clone(),
            principal: session.principal().clone(),
            issued_at: Some(credential.issued_at()),
            expires_at: Some(credential.expires_at()),
        }
    }

    /// Record rebuilt from the separate legacy token and user entries.
    pub fn legacy(token: Token, principal: Principal) -> Self {
        Self {
            token,
            principal,
            issued_at: None,
            expires_at: None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Rebuild a session from this record without contacting the backend.
    ///
    /// Returns `None` when the expiry is unknown or already at or before
    /// `now`. A missing or inconsistent issue time falls back to `now`.
    pub fn to_session(&self, now: DateTime<Utc>) -> Option<Session> {
        let expires_at = self.expires_at?;
        if expires_at <= now {
            return None;
        }
        let issued_at = self
            .issued_at
            .filter(|issued| *issued < expires_at)
            .unwrap_or(now);
        let credential = Credential::new(self.token.clone(), issued_at, expires_at).ok()?;
        Some(Session::new(credential, self.principal.clone()))
    }
}
