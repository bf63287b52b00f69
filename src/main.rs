//! brewdeck binary entrypoint: parse arguments, set up logging, dispatch.

mod args;

use std::fmt::{self, Write as _};
use std::process::ExitCode;
use std::sync::OnceLock;

use clap::Parser;

use brewdeck::config::{Settings, paths};
use brewdeck::coordinator::Coordinator;

struct BrewdeckTimer;

impl tracing_subscriber::fmt::time::FormatTime for BrewdeckTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let ts = chrono::Local::now().format("%Y-%m-%d-T %H:%M:%S%.3f");
        write!(w, "{ts}")
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// What: Initialize tracing to `~/.config/brewdeck/logs/brewdeck.log`.
///
/// Inputs:
/// - `level`: Filter used when `RUST_LOG` is unset.
///
/// Details:
/// - Falls back to stderr when the log file cannot be opened.
fn init_logging(level: &str) {
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    let log_path = paths::logs_dir().join("brewdeck.log");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_timer(BrewdeckTimer)
                .init();
            let _ = LOG_GUARD.set(guard);
            tracing::info!(path = %log_path.display(), "logging initialized");
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .with_timer(BrewdeckTimer)
                .init();
            tracing::warn!(error = %e, "failed to open log file; using stderr");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = args::Args::parse();
    let (settings, warnings) = args.config.as_deref().map_or_else(
        Settings::load_default_with_warnings,
        Settings::load_with_warnings,
    );
    init_logging(&args::determine_log_level(&args, &settings));
    for warning in &warnings {
        tracing::warn!("settings: {warning}");
    }

    tracing::info!(command = ?args.command, "brewdeck starting");
    let coordinator = Coordinator::new(settings.coordinator_options());
    let code = args::process_args(&args, &coordinator).await;
    tracing::info!("brewdeck exited");
    code
}

#[cfg(test)]
mod tests {
    #[test]
    /// What: Timer writes a non-empty timestamp without panicking.
    ///
    /// Inputs:
    /// - Tracing writer over a string buffer.
    ///
    /// Output:
    /// - Buffer holds a `-T` separated timestamp.
    fn brewdeck_timer_formats_time() {
        use tracing_subscriber::fmt::time::FormatTime;
        let mut buf = String::new();
        let mut writer = tracing_subscriber::fmt::format::Writer::new(&mut buf);
        let _ = super::BrewdeckTimer.format_time(&mut writer);
        assert!(buf.contains("-T "));
    }
}
