//! BPTV binary entry point
//!
//! Dispatches to daemon mode or subcommands based on CLI arguments.

use clap::Parser;
use color_eyre::eyre::Result;

use bptv::{cli::Args, cli::Command, commands, config::Config, daemon, logging};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        // No subcommand - show status
        None => {
            logging::init_cli();
            commands::status(false).await
        }

        // Daemon mode - installs its own logging (file vs stderr)
        Some(Command::Daemon { foreground }) => {
            let config = Config::load()?;
            daemon::run(config, foreground).await
        }

        Some(Command::Status { json }) => {
            logging::init_cli();
            commands::status(json).await
        }

        // IPC-based commands (require daemon)
        Some(Command::Pause) => commands::pause().await,
        Some(Command::Resume) => commands::resume().await,
        Some(Command::Toggle) => commands::toggle().await,
        Some(Command::Shutdown) => commands::shutdown().await,

        // Local commands (no daemon needed)
        Some(Command::Check { json }) => {
            logging::init_cli();
            let config = Config::load()?;
            commands::check(&config, json).await
        }

        Some(Command::ListSinks { json }) => {
            logging::init_cli();
            commands::list_sinks(json).await
        }

        Some(Command::Validate) => {
            logging::init_cli();
            let config = Config::load()?;
            commands::validate(&config)
        }
    }
}
