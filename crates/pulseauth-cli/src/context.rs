//! Wiring the manager from CLI flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use pulseauth_core::{AuthManager, SessionConfig};
use pulseauth_file::FileStorage;
use pulseauth_http::{ApiUrl, HttpBackend};

use crate::cli::Cli;

/// Default data directory, e.g. `~/.local/share/pulseauth` on Linux.
fn default_data_dir() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "pulseauth").context("Could not determine data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn session_config(cli: &Cli) -> SessionConfig {
    let mut config = SessionConfig::default();
    if let Some(secs) = cli.lead_time_secs {
        config.lead_time = Duration::from_secs(secs);
    }
    config
}

/// Build a manager over file storage and the HTTP backend.
pub fn manager(cli: &Cli) -> Result<AuthManager> {
    let api_url = cli
        .api_url
        .as_deref()
        .context("No backend URL. Pass --api-url or set PULSEAUTH_API_URL.")?;
    let api = ApiUrl::new(api_url).context("Invalid backend URL")?;
    let backend = HttpBackend::new(api).context("Failed to build HTTP client")?;

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let storage = FileStorage::open(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    tracing::debug!(data_dir = %data_dir.display(), "Using session storage");

    Ok(AuthManager::new(
        Arc::new(backend),
        Arc::new(storage),
        session_config(cli),
    ))
}
