//! Logout command implementation.

use anyhow::Result;

use pulseauth_core::AuthManager;

use crate::output;

pub async fn run(manager: &AuthManager) -> Result<()> {
    manager.logout().await;
    output::success("Logged out");
    Ok(())
}
