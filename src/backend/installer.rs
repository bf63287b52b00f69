//! First-time backend bootstrap via the upstream install script.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use super::command::{BrewRunner, CommandResult, OutputSink, ProcessRunner, RunnerError};

/// Upstream install script.
pub const INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// Result of a bootstrap run, reduced to what callers display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Whether the script exited with status zero.
    pub succeeded: bool,
    /// stderr when non-empty, otherwise stdout.
    pub diagnostic_text: String,
}

impl From<&CommandResult> for InstallOutcome {
    fn from(result: &CommandResult) -> Self {
        Self {
            succeeded: result.succeeded(),
            diagnostic_text: result.diagnostic_text().to_string(),
        }
    }
}

/// Failure to download the install script for inspection.
#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    /// Network or HTTP status failure.
    #[error("failed to download install script: {0}")]
    Download(#[from] reqwest::Error),
}

/// Shell invocation that fetches and executes the install script.
#[derive(Clone, Debug)]
pub struct Installer {
    shell: PathBuf,
    script_url: String,
}

impl Default for Installer {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            script_url: INSTALL_SCRIPT_URL.to_string(),
        }
    }
}

impl Installer {
    /// Installer using a specific shell and script URL.
    pub fn new(shell: impl Into<PathBuf>, script_url: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            script_url: script_url.into(),
        }
    }

    /// Arguments passed to the shell.
    #[must_use]
    pub fn shell_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            format!("curl -fsSL {} | bash", self.script_url),
        ]
    }

    /// What: Run the install script as one long-running command.
    ///
    /// Inputs:
    /// - `sink`: Optional live output receiver.
    ///
    /// Output:
    /// - [`InstallOutcome`] for any exit status.
    ///
    /// # Errors
    /// - [`RunnerError`] when the shell cannot be started.
    ///
    /// Details:
    /// - Sets `NONINTERACTIVE=1` so the script never waits on a prompt.
    pub async fn run(&self, sink: Option<OutputSink>) -> Result<InstallOutcome, RunnerError> {
        let runner = ProcessRunner::new(&self.shell).with_env(HashMap::from([(
            "NONINTERACTIVE".to_string(),
            "1".to_string(),
        )]));
        let args = self.shell_args();
        info!(url = %self.script_url, "running backend install script");
        let result = match sink {
            Some(sink) => runner.run_streaming(&args, sink).await?,
            None => runner.run(&args).await?,
        };
        if result.succeeded() {
            info!("backend install script finished");
        } else {
            warn!(exit_code = result.exit_code, "backend install script failed");
        }
        Ok(InstallOutcome::from(&result))
    }
}

/// Run the default installer. See [`Installer::run`].
///
/// # Errors
/// - [`RunnerError`] when `/bin/bash` cannot be started.
pub async fn install(sink: Option<OutputSink>) -> Result<InstallOutcome, RunnerError> {
    Installer::default().run(sink).await
}

/// What: Download the install script text so it can be reviewed before running.
///
/// # Errors
/// - [`InstallerError::Download`] on network failure or non-success status.
pub async fn fetch_install_script() -> Result<String, InstallerError> {
    let body = reqwest::get(INSTALL_SCRIPT_URL)
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}
