//! Read-only subcommands: installed, outdated, taps and search.

use std::process::ExitCode;

use brewdeck::coordinator::Coordinator;
use brewdeck::model::UnifiedPackage;
use brewdeck::state::{FetchKind, FetchPhase, Snapshot};

use crate::args::utils::format_package;

/// Print a package list, or the failure that prevented fetching it.
fn report_packages(snapshot: &Snapshot, kind: FetchKind, packages: &[UnifiedPackage]) -> ExitCode {
    if snapshot.phase(kind) == FetchPhase::Failed {
        eprintln!(
            "brewdeck: {}",
            snapshot.last_error.as_deref().unwrap_or("request failed")
        );
        return ExitCode::FAILURE;
    }
    if packages.is_empty() {
        println!("No packages.");
    }
    for pkg in packages {
        println!("{}", format_package(pkg));
    }
    ExitCode::SUCCESS
}

/// What: Refresh and print installed packages.
///
/// Output:
/// - `SUCCESS` when the live fetch succeeded; `FAILURE` otherwise.
pub async fn handle_installed(coordinator: &Coordinator) -> ExitCode {
    tracing::info!("List installed requested from CLI");
    coordinator.refresh_installed().await;
    let snap = coordinator.snapshot();
    report_packages(&snap, FetchKind::Installed, &snap.installed_packages)
}

/// Refresh and print outdated packages.
pub async fn handle_outdated(coordinator: &Coordinator) -> ExitCode {
    tracing::info!("List outdated requested from CLI");
    coordinator.refresh_outdated().await;
    let snap = coordinator.snapshot();
    report_packages(&snap, FetchKind::Outdated, &snap.outdated_packages)
}

/// Refresh and print taps.
pub async fn handle_taps(coordinator: &Coordinator) -> ExitCode {
    tracing::info!("List taps requested from CLI");
    coordinator.refresh_taps().await;
    let snap = coordinator.snapshot();
    if snap.phase(FetchKind::Taps) == FetchPhase::Failed {
        eprintln!(
            "brewdeck: {}",
            snap.last_error.as_deref().unwrap_or("request failed")
        );
        return ExitCode::FAILURE;
    }
    for tap in &snap.taps {
        let marker = if tap.official == Some(true) { " (official)" } else { "" };
        println!("{}{marker}", tap.name);
    }
    ExitCode::SUCCESS
}

/// Search and print matches.
pub async fn handle_search(coordinator: &Coordinator, query: &str) -> ExitCode {
    tracing::info!(query = %query, "Search requested from CLI");
    coordinator.search(query).await;
    let snap = coordinator.snapshot();
    report_packages(&snap, FetchKind::Search, &snap.search_results)
}
