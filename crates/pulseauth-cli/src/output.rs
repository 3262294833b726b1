//! Output formatting helpers.

use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use pulseauth_core::{AuthState, Session};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// What `--json` prints for a session. The token itself is never shown.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView<'a> {
    state: AuthState,
    user: &'a pulseauth_core::Principal,
    issued_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    next_refresh_in_secs: Option<u64>,
}

/// Print a session either as fields or as JSON.
pub fn session(
    session: &Session,
    state: AuthState,
    next_refresh: Option<Duration>,
    json: bool,
) -> Result<()> {
    let credential = session.credential();
    let principal = session.principal();

    if json {
        return json_pretty(&SessionView {
            state,
            user: principal,
            issued_at: credential.issued_at(),
            expires_at: credential.expires_at(),
            next_refresh_in_secs: next_refresh.map(|d| d.as_secs()),
        });
    }

    field("User", principal.username());
    field("ID", principal.id());
    if let Some(email) = principal.email() {
        field("Email", email);
    }
    if !principal.roles().is_empty() {
        let roles: Vec<&str> = principal.roles().iter().map(String::as_str).collect();
        field("Roles", &roles.join(", "));
    }
    field("Expires", &credential.expires_at().to_rfc3339());
    if let Some(next) = next_refresh {
        field("Next refresh", &humanize(next));
    }
    Ok(())
}

/// `1h 5m 3s` style rendering of a delay.
pub fn humanize(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m {s}s"),
    }
}
