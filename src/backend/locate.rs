//! Resolution of the `brew` executable and its install prefix.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::command::{BrewRunner, ProcessRunner};

/// Program name looked up on `PATH` when no well-known location exists.
pub const PROGRAM: &str = "brew";
/// Default location on Apple Silicon installs.
pub const PRIMARY_PATH: &str = "/opt/homebrew/bin/brew";
/// Default location on Intel installs.
pub const SECONDARY_PATH: &str = "/usr/local/bin/brew";

/// Which kind of installation a resolved executable belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Installed under `/opt/homebrew`.
    Primary,
    /// Installed under `/usr/local`.
    Secondary,
    /// Anywhere else; carries the resolved path.
    Custom(String),
}

impl Variant {
    /// What: Infer the variant from where an executable lives.
    ///
    /// Inputs:
    /// - `path`: Resolved executable path.
    ///
    /// Output:
    /// - `Primary` for `/opt/homebrew`, `Secondary` for `/usr/local`, else `Custom(path)`.
    #[must_use]
    pub fn classify(path: &str) -> Self {
        if path.contains("/opt/homebrew") {
            Self::Primary
        } else if path.contains("/usr/local") {
            Self::Secondary
        } else {
            Self::Custom(path.to_string())
        }
    }
}

/// A resolved backend executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutableLocation {
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// Installation variant.
    pub variant: Variant,
}

impl ExecutableLocation {
    /// Build a location for a known path, classifying its variant.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let variant = Variant::classify(&path.to_string_lossy());
        Self { path, variant }
    }
}

/// Ordered search strategy for the backend executable.
///
/// Candidates are checked first since a file-existence test costs no
/// subprocess; the `PATH` lookup runs only when none of them exist.
#[derive(Clone, Debug)]
pub struct Locator {
    candidates: Vec<(PathBuf, Variant)>,
    program: String,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(PROGRAM)
            .with_candidate(PRIMARY_PATH, Variant::Primary)
            .with_candidate(SECONDARY_PATH, Variant::Secondary)
    }
}

impl Locator {
    /// Locator with no well-known candidates that searches `PATH` for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            program: program.into(),
        }
    }

    /// Append a well-known candidate path, checked in insertion order.
    #[must_use]
    pub fn with_candidate(mut self, path: impl Into<PathBuf>, variant: Variant) -> Self {
        self.candidates.push((path.into(), variant));
        self
    }

    /// Program name used for the `PATH` fallback.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// What: Resolve the backend executable.
    ///
    /// Output:
    /// - `Some(ExecutableLocation)` for the first existing candidate, else the
    ///   `PATH` match, else `None`.
    ///
    /// Details:
    /// - Never fails; a missing backend is an ordinary outcome.
    #[must_use]
    pub fn locate(&self) -> Option<ExecutableLocation> {
        for (path, variant) in &self.candidates {
            if path.is_file() {
                info!(path = %path.display(), variant = ?variant, "located backend at well-known path");
                return Some(ExecutableLocation {
                    path: path.clone(),
                    variant: variant.clone(),
                });
            }
        }
        match which::which(&self.program) {
            Ok(path) => {
                info!(path = %path.display(), "located backend on PATH");
                Some(ExecutableLocation::from_path(path))
            }
            Err(e) => {
                debug!(program = %self.program, error = %e, "backend not found");
                None
            }
        }
    }
}

/// Resolve the backend with the default candidate list.
#[must_use]
pub fn locate() -> Option<ExecutableLocation> {
    Locator::default().locate()
}

/// What: Ask the backend at `path` for its installation prefix.
///
/// Output:
/// - `Some(prefix)` on success; `None` when the process fails to start, exits
///   non-zero, or prints nothing.
pub async fn prefix_of(path: &Path) -> Option<String> {
    query_prefix(&ProcessRunner::new(path)).await
}

/// What: Run `--prefix` through `runner` and return the trimmed output.
///
/// Output:
/// - `None` on any failure; this lookup never raises.
pub async fn query_prefix(runner: &dyn BrewRunner) -> Option<String> {
    match runner.run(&["--prefix".to_string()]).await {
        Ok(result) if result.succeeded() => {
            let prefix = result.stdout.trim();
            if prefix.is_empty() {
                None
            } else {
                Some(prefix.to_string())
            }
        }
        Ok(result) => {
            debug!(exit_code = result.exit_code, "prefix query exited with non-zero status");
            None
        }
        Err(e) => {
            debug!(error = %e, "prefix query could not run");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Classify paths into installation variants.
    ///
    /// Inputs:
    /// - Apple Silicon, Intel and Linuxbrew style paths.
    ///
    /// Output:
    /// - `Primary`, `Secondary`, and `Custom` carrying the path.
    fn variant_classification_by_path() {
        assert_eq!(Variant::classify("/opt/homebrew/bin/brew"), Variant::Primary);
        assert_eq!(Variant::classify("/usr/local/bin/brew"), Variant::Secondary);
        assert_eq!(
            Variant::classify("/home/linuxbrew/.linuxbrew/bin/brew"),
            Variant::Custom("/home/linuxbrew/.linuxbrew/bin/brew".to_string())
        );
    }

    #[test]
    /// What: First existing candidate wins over later ones.
    ///
    /// Inputs:
    /// - Missing first candidate, existing second and third candidates.
    ///
    /// Output:
    /// - Location equals the second candidate with its declared variant.
    fn locate_prefers_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let second = dir.path().join("second-brew");
        let third = dir.path().join("third-brew");
        std::fs::write(&second, "").expect("write candidate");
        std::fs::write(&third, "").expect("write candidate");

        let locator = Locator::new("brewdeck-test-no-such-program")
            .with_candidate(dir.path().join("missing"), Variant::Primary)
            .with_candidate(&second, Variant::Secondary)
            .with_candidate(&third, Variant::Primary);
        let found = locator.locate().expect("candidate exists");
        assert_eq!(found.path, second);
        assert_eq!(found.variant, Variant::Secondary);
    }

    #[test]
    /// What: Nothing found is `None`, not a panic or error.
    ///
    /// Inputs:
    /// - No candidates and a program name absent from `PATH`.
    ///
    /// Output:
    /// - `None`.
    fn locate_returns_none_when_absent() {
        let locator = Locator::new("brewdeck-test-no-such-program-3f9a");
        assert!(locator.locate().is_none());
    }

    #[tokio::test]
    /// What: Prefix lookup yields `None` when the executable cannot start.
    ///
    /// Inputs:
    /// - Nonexistent executable path.
    ///
    /// Output:
    /// - `None`.
    async fn prefix_of_missing_binary_is_none() {
        assert!(prefix_of(Path::new("/nonexistent/brewdeck/brew")).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    /// What: Prefix lookup yields `None` on non-zero exit.
    ///
    /// Inputs:
    /// - `false`, which ignores its arguments and exits 1.
    ///
    /// Output:
    /// - `None`.
    async fn prefix_of_failing_binary_is_none() {
        assert!(prefix_of(Path::new("false")).await.is_none());
    }
}
