//! Watch command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use pulseauth_core::{AuthManager, AuthState};

use crate::output;

/// Hold the session open, letting the manager refresh it on schedule.
pub async fn run(manager: &AuthManager) -> Result<()> {
    if manager.restore().await != AuthState::LoggedIn {
        anyhow::bail!("No active session. Run 'pulseauth login' first.");
    }

    let mut states = manager.subscribe();
    print_status(manager);
    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                eprintln!();
                eprintln!("{}", "Stopping; session kept.".dimmed());
                return Ok(());
            }
            changed = states.changed() => {
                changed.context("Session manager went away")?;
                let state = *states.borrow_and_update();
                match state {
                    AuthState::LoggedIn => print_status(manager),
                    AuthState::LoggedOut => {
                        output::error("Session ended; log in again.");
                        anyhow::bail!("session ended");
                    }
                    other => eprintln!("{}", format!("{other}...").dimmed()),
                }
            }
        }
    }
}

fn print_status(manager: &AuthManager) {
    let Some(session) = manager.session() else {
        return;
    };
    let next = manager
        .next_refresh_in()
        .map(output::humanize)
        .unwrap_or_else(|| "not scheduled".to_string());
    println!(
        "{} {} (token expires {}, next refresh in {})",
        "●".green(),
        session.principal().username(),
        session.credential().expires_at().to_rfc3339(),
        next
    );
}
