//! Credential lifecycle: startup verification, scheduled refresh, and the
//! state machine that ties them to the session store.

mod manager;
mod scheduler;
mod state;
mod verifier;

pub use manager::AuthManager;
pub use scheduler::RefreshScheduler;
pub use state::AuthState;
pub use verifier::{RetryingVerifier, VerifyOutcome};
