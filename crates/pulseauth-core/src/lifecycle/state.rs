//! Lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where the [`AuthManager`](super::AuthManager) is in the session lifecycle.
///
/// A session exists only in `LoggedIn` and `Refreshing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    Refreshing,
    Verifying,
}

impl AuthState {
    pub fn has_session(self) -> bool {
        matches!(self, AuthState::LoggedIn | AuthState::Refreshing)
    }

    /// Whether a network call owned by the state machine is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            AuthState::LoggingIn | AuthState::Refreshing | AuthState::Verifying
        )
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::LoggedOut => "logged out",
            AuthState::LoggingIn => "logging in",
            AuthState::LoggedIn => "logged in",
            AuthState::Refreshing => "refreshing",
            AuthState::Verifying => "verifying",
        };
        f.write_str(name)
    }
}
