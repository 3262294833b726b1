//! Login command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use pulseauth_core::{AuthManager, AuthState, LoginCredentials};

use crate::cli::LoginArgs;
use crate::output;

pub async fn run(manager: &AuthManager, args: &LoginArgs) -> Result<()> {
    // An existing session must be ended explicitly first.
    if manager.restore().await != AuthState::LoggedOut {
        anyhow::bail!("Already logged in. Run 'pulseauth logout' first.");
    }

    eprintln!("{}", "Logging in...".dimmed());

    let credentials = LoginCredentials::new(&args.username, &args.password);
    let session = manager.login(credentials).await.context("Failed to login")?;

    if !args.output.json {
        output::success("Logged in successfully");
        println!();
    }
    output::session(
        &session,
        manager.state(),
        manager.next_refresh_in(),
        args.output.json,
    )
}
