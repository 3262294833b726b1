//! Whoami command implementation.

use anyhow::{Context, Result};

use pulseauth_core::AuthManager;

use crate::cli::OutputArgs;
use crate::output;

pub async fn run(manager: &AuthManager, args: &OutputArgs) -> Result<()> {
    manager.restore().await;

    let session = manager
        .session()
        .context("No active session. Run 'pulseauth login' first.")?;

    output::session(
        &session,
        manager.state(),
        manager.next_refresh_in(),
        args.json,
    )
}
