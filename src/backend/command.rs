//! Async execution of the package-manager binary.
//!
//! Buffered and streaming invocations share one spawn path. A non-zero exit
//! status is reported inside [`CommandResult`]; only failing to start the
//! process at all is an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Captured outcome of one backend invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Everything the process wrote to standard output.
    pub stdout: String,
    /// Everything the process wrote to standard error.
    pub stderr: String,
    /// Exit status; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl CommandResult {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// What: Pick the text that best explains the outcome of the command.
    ///
    /// Output:
    /// - `stderr` when it is non-empty, otherwise `stdout`.
    ///
    /// Details:
    /// - The backend prints most errors to stderr, but some subcommands report
    ///   failures on stdout only.
    #[must_use]
    pub fn diagnostic_text(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Which pipe an [`OutputLine`] was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One line of live output forwarded to an [`OutputSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    /// Source pipe.
    pub stream: OutputStream,
    /// Line text without the trailing newline and with ANSI escapes removed.
    pub text: String,
}

/// Receiver side of live output. Dropping the receiver detaches the sink
/// without interrupting the process.
pub type OutputSink = mpsc::UnboundedSender<OutputLine>;

/// Failure to run the backend process at all.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The executable could not be started (missing, not executable, ...).
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that was being started.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The process started but waiting for it failed.
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        /// Program that was running.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Seam between the coordinator and the process layer.
///
/// [`ProcessRunner`] is the production implementation; tests substitute
/// scripted runners.
#[async_trait]
pub trait BrewRunner: Send + Sync {
    /// Run the backend with `args` and capture its output.
    ///
    /// # Errors
    /// - [`RunnerError`] when the process cannot be started.
    async fn run(&self, args: &[String]) -> Result<CommandResult, RunnerError>;

    /// Run the backend with `args`, forwarding each output line to `sink`
    /// while still capturing the complete output.
    ///
    /// # Errors
    /// - [`RunnerError`] when the process cannot be started.
    async fn run_streaming(
        &self,
        args: &[String],
        sink: OutputSink,
    ) -> Result<CommandResult, RunnerError>;
}

/// Runner bound to one executable path plus default environment overrides.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    program: PathBuf,
    env: HashMap<String, String>,
}

impl ProcessRunner {
    /// Create a runner for `program` with no environment overrides.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: HashMap::new(),
        }
    }

    /// Replace the environment overrides applied to every invocation.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Executable this runner invokes.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// What: Run once with extra environment overrides layered on the defaults.
    ///
    /// Inputs:
    /// - `args`: Backend arguments.
    /// - `extra_env`: Overrides that win over both the runner defaults and the
    ///   ambient process environment.
    ///
    /// # Errors
    /// - [`RunnerError::Spawn`] when the executable cannot be started.
    pub async fn run_with_env(
        &self,
        args: &[String],
        extra_env: &HashMap<String, String>,
    ) -> Result<CommandResult, RunnerError> {
        let mut env = self.env.clone();
        env.extend(extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        run_command(&self.program, args, &env).await
    }
}

#[async_trait]
impl BrewRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> Result<CommandResult, RunnerError> {
        run_command(&self.program, args, &self.env).await
    }

    async fn run_streaming(
        &self,
        args: &[String],
        sink: OutputSink,
    ) -> Result<CommandResult, RunnerError> {
        run_command_streaming(&self.program, args, &self.env, sink).await
    }
}

/// What: Execute `program` with `args` and capture stdout, stderr and exit code.
///
/// Inputs:
/// - `program`: Executable path.
/// - `args`: Arguments, passed verbatim.
/// - `env`: Overrides merged on top of the ambient environment.
///
/// Output:
/// - [`CommandResult`] for any exit status, including non-zero.
///
/// # Errors
/// - [`RunnerError::Spawn`] when the process cannot be started.
///
/// Details:
/// - Output is decoded lossily so stray non-UTF-8 bytes never fail a call.
pub async fn run_command(
    program: &Path,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<CommandResult, RunnerError> {
    let display_label = display_label(program, args);
    debug!(command = %display_label, "executing backend command");

    let output = build_command(program, args, env)
        .output()
        .await
        .map_err(|source| spawn_error(program, &display_label, source))?;

    let result = CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    };
    log_completion(&display_label, &result);
    Ok(result)
}

/// What: Execute `program` and forward its output line by line while it runs.
///
/// Inputs:
/// - `program`, `args`, `env`: As for [`run_command`].
/// - `sink`: Receives one [`OutputLine`] per line from either stream.
///
/// Output:
/// - The same aggregated [`CommandResult`] [`run_command`] would produce.
///
/// # Errors
/// - [`RunnerError::Spawn`] when the process cannot be started.
/// - [`RunnerError::Wait`] when waiting on the child fails.
///
/// Details:
/// - Each pipe is drained by its own read loop, joined with the exit wait, so
///   neither pipe can fill up and stall the child.
/// - Once the sink's receiver is gone, forwarding stops but capture continues
///   until the process exits; the process is never killed from here.
pub async fn run_command_streaming(
    program: &Path,
    args: &[String],
    env: &HashMap<String, String>,
    sink: OutputSink,
) -> Result<CommandResult, RunnerError> {
    let display_label = display_label(program, args);
    debug!(command = %display_label, "executing backend command (streaming)");

    let mut child = build_command(program, args, env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| spawn_error(program, &display_label, source))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr, status) = tokio::join!(
        pump_lines(stdout, OutputStream::Stdout, &sink),
        pump_lines(stderr, OutputStream::Stderr, &sink),
        child.wait(),
    );
    let status = status.map_err(|source| {
        warn!(command = %display_label, error = %source, "failed to wait for command");
        RunnerError::Wait {
            program: program.display().to_string(),
            source,
        }
    })?;

    let result = CommandResult {
        stdout,
        stderr,
        exit_code: status.code().unwrap_or(-1),
    };
    log_completion(&display_label, &result);
    Ok(result)
}

/// Build the command with inherited environment plus overrides and no stdin.
fn build_command(program: &Path, args: &[String], env: &HashMap<String, String>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).envs(env).stdin(Stdio::null());
    cmd
}

/// What: Read `stream` to EOF, capturing everything and forwarding each line.
///
/// Output:
/// - Full lossily-decoded text read from the stream.
///
/// Details:
/// - After a read error the rest of the stream is discarded rather than left
///   unread, so a child still writing to it can never block on a full pipe.
async fn pump_lines<R>(stream: Option<R>, which: OutputStream, sink: &OutputSink) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return String::new();
    };
    let mut reader = BufReader::new(stream);
    let mut captured = String::new();
    let mut buf = Vec::new();
    let mut attached = true;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&buf);
                captured.push_str(&chunk);
                if attached {
                    let text = strip_ansi_escapes::strip_str(chunk.trim_end_matches(['\n', '\r']));
                    if sink.send(OutputLine { stream: which, text }).is_err() {
                        debug!(stream = ?which, "output sink detached; capturing only");
                        attached = false;
                    }
                }
            }
            Err(e) => {
                warn!(stream = ?which, error = %e, "failed reading command output; draining");
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    warn!(stream = ?which, error = %e, "failed draining command output");
                }
                break;
            }
        }
    }
    captured
}

/// Human-friendly command line for logs.
fn display_label(program: &Path, args: &[String]) -> String {
    let mut label = program.display().to_string();
    for arg in args {
        label.push(' ');
        label.push_str(arg);
    }
    label
}

fn spawn_error(program: &Path, display_label: &str, source: std::io::Error) -> RunnerError {
    warn!(command = %display_label, error = %source, "failed to spawn command");
    RunnerError::Spawn {
        program: program.display().to_string(),
        source,
    }
}

fn log_completion(display_label: &str, result: &CommandResult) {
    if result.succeeded() {
        debug!(
            command = %display_label,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "command completed successfully"
        );
    } else {
        warn!(
            command = %display_label,
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "command exited with non-zero status"
        );
    }
}
