//! Wire shapes as emitted by `brew ... --json`.
//!
//! These are deliberately loose: every field the backend may omit or null is
//! an `Option`, and the only hard requirement is a formula `name` (a cask can
//! always fall back to an empty identity). Conversion into the public record
//! types applies the fallback chains.

use super::InstalledVersion;

/// `name` on cask records: a display string or a list of aliases.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum NameField {
    /// Single display name.
    One(String),
    /// Alias list; the first element is used.
    Many(Vec<String>),
}

impl NameField {
    pub fn into_display(self) -> Option<String> {
        match self {
            Self::One(name) => Some(name),
            Self::Many(names) => names.into_iter().next(),
        }
    }
}

/// `installed` on either record kind.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum InstalledField {
    /// Full per-version install records.
    Records(Vec<InstalledVersion>),
    /// Casks report the installed version as a bare string.
    Version(String),
}

impl InstalledField {
    pub fn into_versions(self) -> Vec<InstalledVersion> {
        match self {
            Self::Records(records) => records,
            Self::Version(version) => vec![InstalledVersion::bare(version)],
        }
    }
}

/// Formula record straight off the wire.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawFormula {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub installed: Option<InstalledField>,
    #[serde(default)]
    pub installed_versions: Option<Vec<String>>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub build_dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub conflicts_with: Option<Vec<String>>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub outdated: Option<bool>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub disable_reason: Option<String>,
}

/// Cask record straight off the wire.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawCask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<NameField>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub installed: Option<InstalledField>,
    #[serde(default)]
    pub installed_versions: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub outdated: Option<bool>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub disable_reason: Option<String>,
}

/// Tap record straight off the wire.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RawTap {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub official: Option<bool>,
    #[serde(default)]
    pub custom_remote: Option<bool>,
    #[serde(default)]
    pub pinned: Option<bool>,
}

/// Pick the install list, falling back to the outdated report's version list.
pub fn installed_or_reported(
    installed: Option<InstalledField>,
    reported: Option<Vec<String>>,
) -> Option<Vec<InstalledVersion>> {
    installed.map(InstalledField::into_versions).or_else(|| {
        reported.map(|versions| versions.into_iter().map(InstalledVersion::bare).collect())
    })
}
