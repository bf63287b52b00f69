//! Errors raised by mutating operations.

/// What: Failure of an install, uninstall, upgrade or update.
///
/// Details:
/// - The payload of each failure variant is the backend's diagnostic text
///   (stderr, or stdout when stderr is empty), or the OS error text when the
///   process could not be started.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    /// No backend executable was found.
    #[error("package manager backend is not available")]
    BackendUnavailable,
    /// `install` exited non-zero.
    #[error("installation failed: {0}")]
    InstallFailed(String),
    /// `uninstall` exited non-zero.
    #[error("uninstallation failed: {0}")]
    UninstallFailed(String),
    /// `upgrade` exited non-zero.
    #[error("upgrade failed: {0}")]
    UpgradeFailed(String),
    /// `update` exited non-zero.
    #[error("update failed: {0}")]
    UpdateFailed(String),
}

impl ManagerError {
    /// Diagnostic text carried by a failure variant.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::BackendUnavailable => None,
            Self::InstallFailed(d)
            | Self::UninstallFailed(d)
            | Self::UpgradeFailed(d)
            | Self::UpdateFailed(d) => Some(d),
        }
    }
}
