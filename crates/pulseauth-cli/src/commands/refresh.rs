//! Refresh command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use pulseauth_core::{AuthManager, AuthState};

use crate::cli::OutputArgs;
use crate::output;

pub async fn run(manager: &AuthManager, args: &OutputArgs) -> Result<()> {
    if manager.restore().await != AuthState::LoggedIn {
        anyhow::bail!("No active session. Run 'pulseauth login' first.");
    }

    eprintln!("{}", "Refreshing session...".dimmed());

    let refreshed = manager
        .refresh()
        .await
        .context("Failed to refresh session; it has been cleared")?;
    let session = manager
        .session()
        .context("Session ended during refresh")?;

    if !args.json {
        if refreshed {
            output::success("Session refreshed successfully");
        } else {
            output::error("Refresh skipped");
        }
        println!();
    }
    output::session(
        &session,
        manager.state(),
        manager.next_refresh_in(),
        args.json,
    )
}
