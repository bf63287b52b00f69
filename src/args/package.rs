//! Mutating subcommands: install, uninstall, upgrade and update.

use std::process::ExitCode;

use brewdeck::coordinator::{Coordinator, ManagerError};
use brewdeck::model::{PackageKind, UnifiedPackage};

use crate::args::utils::spawn_progress_printer;

/// Package named on the command line.
pub fn target(name: &str, cask: bool) -> UnifiedPackage {
    let kind = if cask {
        PackageKind::Cask
    } else {
        PackageKind::Formula
    };
    UnifiedPackage::named(name, kind)
}

/// Wait for the printer to drain, then turn the outcome into an exit code.
async fn finish(
    outcome: Result<(), ManagerError>,
    printer: tokio::task::JoinHandle<()>,
    done: &str,
) -> ExitCode {
    let _ = printer.await;
    match outcome {
        Ok(()) => {
            println!("{done}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("brewdeck: {e}");
            ExitCode::FAILURE
        }
    }
}

/// What: Install one package with live progress.
///
/// Output:
/// - `SUCCESS` when the backend exits zero.
pub async fn handle_install(coordinator: &Coordinator, pkg: &UnifiedPackage) -> ExitCode {
    tracing::info!(name = %pkg.qualified_name, kind = pkg.kind.as_str(), "Install requested from CLI");
    let (sink, printer) = spawn_progress_printer();
    let outcome = coordinator.install(pkg, Some(sink)).await;
    finish(outcome, printer, &format!("Installed {}.", pkg.name)).await
}

/// Uninstall one package with live progress.
pub async fn handle_uninstall(coordinator: &Coordinator, pkg: &UnifiedPackage) -> ExitCode {
    tracing::info!(name = %pkg.qualified_name, kind = pkg.kind.as_str(), "Uninstall requested from CLI");
    let (sink, printer) = spawn_progress_printer();
    let outcome = coordinator.uninstall(pkg, Some(sink)).await;
    finish(outcome, printer, &format!("Uninstalled {}.", pkg.name)).await
}

/// Upgrade one package, or all of them when `pkg` is `None`.
pub async fn handle_upgrade(coordinator: &Coordinator, pkg: Option<&UnifiedPackage>) -> ExitCode {
    let (sink, printer) = spawn_progress_printer();
    let (outcome, done) = match pkg {
        Some(pkg) => {
            tracing::info!(name = %pkg.qualified_name, "Upgrade requested from CLI");
            (
                coordinator.upgrade(pkg, Some(sink)).await,
                format!("Upgraded {}.", pkg.name),
            )
        }
        None => {
            tracing::info!("Upgrade all requested from CLI");
            (
                coordinator.upgrade_all(Some(sink)).await,
                "Upgraded all packages.".to_string(),
            )
        }
    };
    finish(outcome, printer, &done).await
}

/// Update backend metadata and report how many packages are now outdated.
pub async fn handle_update(coordinator: &Coordinator) -> ExitCode {
    tracing::info!("Update requested from CLI");
    let (sink, printer) = spawn_progress_printer();
    let outcome = coordinator.update(Some(sink)).await;
    let outdated = coordinator.snapshot().outdated_packages.len();
    finish(
        outcome,
        printer,
        &format!("Update finished; {outdated} package(s) outdated."),
    )
    .await
}
