//! Command-line argument definition and processing.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use brewdeck::coordinator::Coordinator;

/// brewdeck - inspect and drive a Homebrew installation from the terminal
#[derive(Parser, Debug)]
#[command(name = "brewdeck")]
#[command(version)]
#[command(about = "Inspect and drive a Homebrew installation from the terminal", long_about = None)]
pub struct Args {
    /// Read settings from this file instead of ~/.config/brewdeck/settings.conf
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Set the logging level (trace, debug, info, warn, error); overrides settings
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose output (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List installed formulae and casks
    List,
    /// List packages with newer versions available
    Outdated,
    /// List configured taps
    Taps,
    /// Search formulae and casks
    Search {
        /// Search text
        query: String,
    },
    /// Install a package
    Install {
        /// Treat the name as a cask
        #[arg(long)]
        cask: bool,
        /// Package name
        name: String,
    },
    /// Uninstall a package
    Uninstall {
        /// Treat the name as a cask
        #[arg(long)]
        cask: bool,
        /// Package name
        name: String,
    },
    /// Upgrade one package, or everything when no name is given
    Upgrade {
        /// Treat the name as a cask
        #[arg(long, requires = "name")]
        cask: bool,
        /// Package name
        name: Option<String>,
    },
    /// Fetch the newest backend metadata
    Update,
    /// Print the backend installation prefix
    Prefix,
    /// Remove every cached list
    CacheClear,
    /// Install the backend when it is missing
    Setup {
        /// Print the install script instead of running it
        #[arg(long)]
        show_script: bool,
    },
}

/// What: Dispatch the parsed subcommand.
///
/// Inputs:
/// - `args`: Parsed command-line arguments.
/// - `coordinator`: Shared coordinator built from settings.
///
/// Output:
/// - Process exit code.
pub async fn process_args(args: &Args, coordinator: &Coordinator) -> ExitCode {
    use crate::args::{cache, list, package, setup};

    match &args.command {
        Command::List => list::handle_installed(coordinator).await,
        Command::Outdated => list::handle_outdated(coordinator).await,
        Command::Taps => list::handle_taps(coordinator).await,
        Command::Search { query } => list::handle_search(coordinator, query).await,
        Command::Install { cask, name } => {
            package::handle_install(coordinator, &package::target(name, *cask)).await
        }
        Command::Uninstall { cask, name } => {
            package::handle_uninstall(coordinator, &package::target(name, *cask)).await
        }
        Command::Upgrade { cask, name } => {
            let target = name.as_deref().map(|n| package::target(n, *cask));
            package::handle_upgrade(coordinator, target.as_ref()).await
        }
        Command::Update => package::handle_update(coordinator).await,
        Command::Prefix => setup::handle_prefix(coordinator).await,
        Command::CacheClear => cache::handle_clear_cache(coordinator).await,
        Command::Setup { show_script } => setup::handle_setup(coordinator, *show_script).await,
    }
}
