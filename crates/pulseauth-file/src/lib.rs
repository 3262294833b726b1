//! pulseauth-file - Filesystem-backed session storage.
//!
//! [`FileStorage`] keeps each key in its own file under a data directory,
//! suitable as the durable store behind a pulseauth
//! [`AuthManager`](pulseauth_core::AuthManager).

mod store;

pub use store::FileStorage;
