//! Command-line cache management functionality.

use std::process::ExitCode;

use brewdeck::coordinator::Coordinator;

/// What: Remove every cached list.
///
/// Output:
/// - `SUCCESS` when the cache directory was cleared or did not exist.
pub async fn handle_clear_cache(coordinator: &Coordinator) -> ExitCode {
    let root = coordinator.cache().root().to_path_buf();
    tracing::info!(root = %root.display(), "Clear cache requested from CLI");
    match coordinator.clear_cache().await {
        Ok(()) => {
            println!("Cleared cache at {}.", root.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to clear cache");
            eprintln!("brewdeck: {e}");
            ExitCode::FAILURE
        }
    }
}
