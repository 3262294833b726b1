//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Log in to a pulseauth backend and keep the session fresh.
#[derive(Parser, Debug)]
#[command(name = "pulseauth")]
#[command(author, version = env!("PULSEAUTH_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Backend base URL, e.g. https://coach.example.com/api
    #[arg(long, env = "PULSEAUTH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Directory holding the persisted session
    #[arg(long, env = "PULSEAUTH_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Refresh this many seconds before the token expires
    #[arg(long, env = "PULSEAUTH_LEAD_TIME_SECS", global = true)]
    pub lead_time_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and persist the session
    Login(LoginArgs),

    /// Show the persisted session, verifying it if it is about to expire
    Whoami(OutputArgs),

    /// Exchange the current token for a fresh one
    Refresh(OutputArgs),

    /// End the session and clear persisted state
    Logout,

    /// Keep the session alive, refreshing it before expiry, until Ctrl+C
    Watch,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account username
    #[arg(long, short)]
    pub username: String,

    /// Account password
    #[arg(long, env = "PULSEAUTH_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Print the session as JSON
    #[arg(long)]
    pub json: bool,
}
