//! Seams to the outside world: the auth backend and durable storage.

mod backend;
mod storage;

pub use backend::{AuthGrant, BackendClient, Verified};
pub use storage::Storage;
