//! pulseauth-http - HTTP implementation of the pulseauth backend.
//!
//! [`HttpBackend`] talks to three endpoints below an [`ApiUrl`]:
//! `POST auth/login`, `GET auth/verify` and `POST auth/refresh`, and
//! normalizes both response envelopes the backend has used over time.

mod api_url;
mod backend;
mod client;
pub mod endpoints;
pub mod envelope;

pub use api_url::ApiUrl;
pub use backend::HttpBackend;
pub use client::{DEFAULT_TIMEOUT, HttpClient};
