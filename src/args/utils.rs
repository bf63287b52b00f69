//! Shared utilities for argument processing.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use brewdeck::backend::{OutputLine, OutputSink, OutputStream};
use brewdeck::config::Settings;
use brewdeck::model::UnifiedPackage;

/// What: Determine the log level from command-line arguments and settings.
///
/// Inputs:
/// - `args`: Parsed command-line arguments.
/// - `settings`: Loaded settings.
///
/// Output:
/// - Filter directive string (e.g. `info`, `brewdeck=debug`).
///
/// Details:
/// - `--verbose` wins over `--log-level`, which wins over `log_level` in settings.
pub fn determine_log_level(args: &crate::args::Args, settings: &Settings) -> String {
    if args.verbose {
        "debug".to_string()
    } else if let Some(level) = &args.log_level {
        level.clone()
    } else {
        settings.log_level.clone()
    }
}

/// What: Start a task that echoes live backend output to the terminal.
///
/// Output:
/// - The sink to hand to the coordinator, and the printer task. The task ends
///   once the sink is dropped, which happens when the command finishes.
pub fn spawn_progress_printer() -> (OutputSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            match line.stream {
                OutputStream::Stdout => println!("{}", line.text),
                OutputStream::Stderr => eprintln!("{}", line.text),
            }
        }
    });
    (tx, handle)
}

/// One display line for a package.
pub fn format_package(pkg: &UnifiedPackage) -> String {
    let mut line = format!(
        "{:<32} {:<14} {}",
        pkg.name,
        pkg.version.as_deref().unwrap_or("-"),
        pkg.kind.as_str()
    );
    if pkg.is_outdated {
        line.push_str(" [outdated]");
    }
    if pkg.is_deprecated {
        line.push_str(" [deprecated]");
    }
    line
}
