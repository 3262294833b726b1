//! Subcommand implementations.

mod login;
mod logout;
mod refresh;
mod watch;
mod whoami;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::context;

pub async fn handle(cli: &Cli) -> Result<()> {
    let manager = context::manager(cli)?;

    let result = match &cli.command {
        Commands::Login(args) => login::run(&manager, args).await,
        Commands::Whoami(args) => whoami::run(&manager, args).await,
        Commands::Refresh(args) => refresh::run(&manager, args).await,
        Commands::Logout => logout::run(&manager).await,
        Commands::Watch => watch::run(&manager).await,
    };

    // Leave the persisted session in place; only logout clears it.
    manager.shutdown();
    result
}
