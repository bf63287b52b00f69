//! Published state: what observers of the coordinator get to see.
//!
//! A [`Snapshot`] is always replaced as a whole, so a reader never sees a
//! half-applied refresh.

use crate::model::{TapRecord, UnifiedPackage};

/// Lifecycle of one kind of fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPhase {
    /// Never started, or cleared.
    #[default]
    Idle,
    /// A fetch is in progress.
    Loading,
    /// Last fetch succeeded.
    Ready,
    /// Last fetch failed; data from before the failure is kept.
    Failed,
}

/// The independently tracked fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// `list --json=v2`.
    Installed,
    /// `outdated --json=v2`.
    Outdated,
    /// `tap --json`.
    Taps,
    /// `search --json=v2`.
    Search,
}

impl FetchKind {
    /// Lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Outdated => "outdated",
            Self::Taps => "taps",
            Self::Search => "search",
        }
    }
}

/// Current phase of each fetch kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FetchPhases {
    /// Installed list.
    pub installed: FetchPhase,
    /// Outdated list.
    pub outdated: FetchPhase,
    /// Tap list.
    pub taps: FetchPhase,
    /// Search results.
    pub search: FetchPhase,
}

impl FetchPhases {
    /// Phase for `kind`.
    #[must_use]
    pub const fn get(&self, kind: FetchKind) -> FetchPhase {
        match kind {
            FetchKind::Installed => self.installed,
            FetchKind::Outdated => self.outdated,
            FetchKind::Taps => self.taps,
            FetchKind::Search => self.search,
        }
    }

    /// Set the phase for `kind`.
    pub const fn set(&mut self, kind: FetchKind, phase: FetchPhase) {
        match kind {
            FetchKind::Installed => self.installed = phase,
            FetchKind::Outdated => self.outdated = phase,
            FetchKind::Taps => self.taps = phase,
            FetchKind::Search => self.search = phase,
        }
    }
}

/// What: Everything an observer can read about the backend.
///
/// Details:
/// - `is_loading` is true while any fetch or write operation is in flight.
/// - `last_error` holds the diagnostic of the most recent failure and is
///   cleared when a fetch starts.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    /// Installed formulae followed by installed casks.
    pub installed_packages: Vec<UnifiedPackage>,
    /// Outdated formulae followed by outdated casks.
    pub outdated_packages: Vec<UnifiedPackage>,
    /// Results of the last search.
    pub search_results: Vec<UnifiedPackage>,
    /// Configured taps.
    pub taps: Vec<TapRecord>,
    /// Any operation in flight.
    pub is_loading: bool,
    /// Diagnostic of the latest failure.
    pub last_error: Option<String>,
    /// A backend executable was found.
    pub is_backend_available: bool,
    /// Path of the backend executable, when known.
    pub backend_path: Option<String>,
    /// Per-fetch lifecycle.
    pub phases: FetchPhases,
}

impl Snapshot {
    /// Phase for `kind`.
    #[must_use]
    pub const fn phase(&self, kind: FetchKind) -> FetchPhase {
        self.phases.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Phase accessors address the right slot.
    ///
    /// Inputs:
    /// - Default phases, then taps set to `Failed`.
    ///
    /// Output:
    /// - Only taps changes.
    fn phases_get_and_set() {
        let mut snap = Snapshot::default();
        assert_eq!(snap.phase(FetchKind::Taps), FetchPhase::Idle);
        snap.phases.set(FetchKind::Taps, FetchPhase::Failed);
        assert_eq!(snap.phase(FetchKind::Taps), FetchPhase::Failed);
        assert_eq!(snap.phase(FetchKind::Installed), FetchPhase::Idle);
        assert_eq!(snap.phase(FetchKind::Outdated), FetchPhase::Idle);
        assert_eq!(snap.phase(FetchKind::Search), FetchPhase::Idle);
        assert_eq!(FetchKind::Search.as_str(), "search");
    }
}
