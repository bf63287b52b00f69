//! Everything that touches the `brew` executable directly: finding it,
//! running it, and bootstrapping it.

pub mod command;
pub mod installer;
pub mod locate;

pub use command::{
    BrewRunner, CommandResult, OutputLine, OutputSink, OutputStream, ProcessRunner, RunnerError,
    run_command, run_command_streaming,
};
pub use installer::{InstallOutcome, Installer, InstallerError, fetch_install_script, install};
pub use locate::{ExecutableLocation, Locator, Variant, locate, prefix_of, query_prefix};
