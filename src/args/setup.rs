//! Backend bootstrap and inspection subcommands.

use std::process::ExitCode;

use brewdeck::backend::fetch_install_script;
use brewdeck::coordinator::Coordinator;

use crate::args::utils::spawn_progress_printer;

/// Print the backend installation prefix.
pub async fn handle_prefix(coordinator: &Coordinator) -> ExitCode {
    match coordinator.backend_prefix().await {
        Some(prefix) => {
            println!("{prefix}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("brewdeck: backend prefix unavailable");
            ExitCode::FAILURE
        }
    }
}

/// What: Install the backend when missing, or show the install script.
///
/// Inputs:
/// - `show_script`: Print the script text instead of running it.
///
/// Output:
/// - `SUCCESS` when the backend is (now) available or the script was printed.
///
/// Details:
/// - An already available backend is reported and left untouched.
pub async fn handle_setup(coordinator: &Coordinator, show_script: bool) -> ExitCode {
    if show_script {
        return match fetch_install_script().await {
            Ok(script) => {
                print!("{script}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("brewdeck: {e}");
                ExitCode::FAILURE
            }
        };
    }
    if coordinator.is_backend_available() {
        let path = coordinator.snapshot().backend_path.unwrap_or_default();
        println!("Backend already installed at {path}.");
        return ExitCode::SUCCESS;
    }

    tracing::info!("Backend setup requested from CLI");
    let (sink, printer) = spawn_progress_printer();
    let outcome = coordinator.install_backend(Some(sink)).await;
    let _ = printer.await;
    match outcome {
        Ok(outcome) if outcome.succeeded && coordinator.is_backend_available() => {
            println!("Backend installed.");
            ExitCode::SUCCESS
        }
        Ok(outcome) if outcome.succeeded => {
            eprintln!("brewdeck: install script finished but the backend was not found");
            ExitCode::FAILURE
        }
        Ok(outcome) => {
            eprintln!("brewdeck: backend install failed: {}", outcome.diagnostic_text);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("brewdeck: {e}");
            ExitCode::FAILURE
        }
    }
}
