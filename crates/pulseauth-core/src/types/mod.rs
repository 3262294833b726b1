//! Session data model.
//!
//! These types enforce their invariants at construction time: a token is
//! never empty and a credential never expires before it was issued.

mod credential;
mod login;
mod principal;
mod record;
mod session;
mod token;

pub use credential::Credential;
pub use login::LoginCredentials;
pub use principal::Principal;
pub use record::SessionRecord;
pub use session::Session;
pub use token::Token;
