//! Package model: the two upstream record kinds, taps, and the unified view.
//!
//! Formulae (built from source) and casks (binary distributions) keep their
//! own record types; consumers either match on [`PackageRecord`] or work with
//! the flattened [`UnifiedPackage`] that the cache stores and the coordinator
//! publishes.

mod decode;
mod records;

pub use decode::{DecodeError, Envelope, decode, decode_envelope, decode_taps};

use records::{RawCask, RawFormula, RawTap, installed_or_reported};

/// One installed version of a package.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InstalledVersion {
    /// Version string.
    pub version: String,
    /// Installed because the user asked for it.
    #[serde(default)]
    pub installed_on_request: bool,
    /// Installed to satisfy another package.
    #[serde(default)]
    pub installed_as_dependency: bool,
}

impl InstalledVersion {
    /// Version known only by its string, as reported by `outdated` or a cask.
    #[must_use]
    pub fn bare(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            installed_on_request: false,
            installed_as_dependency: false,
        }
    }
}

/// What: A formula record after fallbacks are applied.
///
/// Details:
/// - `id` falls back to `name`; `full_name` falls back to `name`.
/// - `version` falls back to the outdated report's `current_version`, and
///   `installed` to its `installed_versions`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(from = "RawFormula")]
pub struct FormulaRecord {
    /// Stable identity.
    pub id: String,
    /// Short name.
    pub name: String,
    /// Tap-qualified name.
    pub full_name: String,
    /// One-line description.
    pub desc: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Current version.
    pub version: Option<String>,
    /// Installed versions; `None` when the backend omitted the field.
    pub installed: Option<Vec<InstalledVersion>>,
    /// Runtime dependencies.
    pub dependencies: Option<Vec<String>>,
    /// Build-time dependencies.
    pub build_dependencies: Option<Vec<String>>,
    /// Conflicting formulae.
    pub conflicts_with: Option<Vec<String>>,
    /// Pinned against upgrades.
    pub pinned: Option<bool>,
    /// Newer version available.
    pub outdated: Option<bool>,
    /// Deprecated upstream.
    pub deprecated: Option<bool>,
    /// Why it was deprecated.
    pub deprecation_reason: Option<String>,
    /// Disabled upstream.
    pub disabled: Option<bool>,
    /// Why it was disabled.
    pub disable_reason: Option<String>,
}

impl From<RawFormula> for FormulaRecord {
    fn from(raw: RawFormula) -> Self {
        Self {
            id: raw.id.unwrap_or_else(|| raw.name.clone()),
            full_name: raw.full_name.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            desc: raw.desc,
            homepage: raw.homepage,
            version: raw.version.or(raw.current_version),
            installed: installed_or_reported(raw.installed, raw.installed_versions),
            dependencies: raw.dependencies,
            build_dependencies: raw.build_dependencies,
            conflicts_with: raw.conflicts_with,
            pinned: raw.pinned,
            outdated: raw.outdated,
            deprecated: raw.deprecated,
            deprecation_reason: raw.deprecation_reason,
            disabled: raw.disabled,
            disable_reason: raw.disable_reason,
        }
    }
}

/// What: A cask record after fallbacks are applied.
///
/// Details:
/// - `name` is the display name: the string, or the first alias of a list.
/// - `id` falls back to `token`, then the display name, then `""`.
/// - `token` and `full_name` fall back to the display name.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(from = "RawCask")]
pub struct CaskRecord {
    /// Stable identity.
    pub id: String,
    /// Cask token used on the command line.
    pub token: String,
    /// Display name.
    pub name: String,
    /// Tap-qualified name.
    pub full_name: String,
    /// One-line description.
    pub desc: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Current version.
    pub version: Option<String>,
    /// Installed versions; `None` when the backend omitted the field.
    pub installed: Option<Vec<InstalledVersion>>,
    /// Download URL.
    pub url: Option<String>,
    /// Newer version available.
    pub outdated: Option<bool>,
    /// Deprecated upstream.
    pub deprecated: Option<bool>,
    /// Why it was deprecated.
    pub deprecation_reason: Option<String>,
    /// Disabled upstream.
    pub disabled: Option<bool>,
    /// Why it was disabled.
    pub disable_reason: Option<String>,
}

impl From<RawCask> for CaskRecord {
    fn from(raw: RawCask) -> Self {
        let display = raw
            .name
            .and_then(records::NameField::into_display)
            .unwrap_or_default();
        let id = raw
            .id
            .or_else(|| raw.token.clone())
            .unwrap_or_else(|| display.clone());
        Self {
            id,
            token: raw.token.unwrap_or_else(|| display.clone()),
            full_name: raw.full_name.unwrap_or_else(|| display.clone()),
            name: display,
            desc: raw.desc,
            homepage: raw.homepage,
            version: raw.version.or(raw.current_version),
            installed: installed_or_reported(raw.installed, raw.installed_versions),
            url: raw.url,
            outdated: raw.outdated,
            deprecated: raw.deprecated,
            deprecation_reason: raw.deprecation_reason,
            disabled: raw.disabled,
            disable_reason: raw.disable_reason,
        }
    }
}

/// A decoded record of either kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackageRecord {
    /// Built from source.
    Formula(FormulaRecord),
    /// Binary distribution.
    Cask(CaskRecord),
}

impl PackageRecord {
    /// Which kind this record is.
    #[must_use]
    pub const fn kind(&self) -> PackageKind {
        match self {
            Self::Formula(_) => PackageKind::Formula,
            Self::Cask(_) => PackageKind::Cask,
        }
    }

    /// Flatten into the unified view.
    #[must_use]
    pub fn to_unified(&self) -> UnifiedPackage {
        match self {
            Self::Formula(f) => UnifiedPackage::from(f),
            Self::Cask(c) => UnifiedPackage::from(c),
        }
    }
}

/// Package kind tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Built from source.
    Formula,
    /// Binary distribution.
    Cask,
}

impl PackageKind {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Formula => "formula",
            Self::Cask => "cask",
        }
    }
}

/// What: Flattened package shared by both kinds.
///
/// Details:
/// - `is_installed` holds only when the installed list is present and non-empty.
/// - Absent `outdated` / `deprecated` flags read as `false`.
/// - This is the shape written to the cache and published in snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UnifiedPackage {
    /// Stable identity from the record.
    pub identity: String,
    /// Display name.
    pub name: String,
    /// Name passed to mutating commands.
    pub qualified_name: String,
    /// Record kind.
    pub kind: PackageKind,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Current version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// At least one version installed.
    #[serde(default)]
    pub is_installed: bool,
    /// Newer version available.
    #[serde(default)]
    pub is_outdated: bool,
    /// Deprecated upstream.
    #[serde(default)]
    pub is_deprecated: bool,
}

impl UnifiedPackage {
    /// Package known only by name, e.g. from a command-line argument.
    #[must_use]
    pub fn named(name: impl Into<String>, kind: PackageKind) -> Self {
        let name = name.into();
        Self {
            identity: name.clone(),
            qualified_name: name.clone(),
            name,
            kind,
            description: None,
            homepage: None,
            version: None,
            is_installed: false,
            is_outdated: false,
            is_deprecated: false,
        }
    }
}

fn has_installs(installed: Option<&Vec<InstalledVersion>>) -> bool {
    installed.is_some_and(|v| !v.is_empty())
}

impl From<&FormulaRecord> for UnifiedPackage {
    fn from(f: &FormulaRecord) -> Self {
        Self {
            identity: f.id.clone(),
            name: f.name.clone(),
            qualified_name: f.full_name.clone(),
            kind: PackageKind::Formula,
            description: f.desc.clone(),
            homepage: f.homepage.clone(),
            version: f.version.clone(),
            is_installed: has_installs(f.installed.as_ref()),
            is_outdated: f.outdated.unwrap_or(false),
            is_deprecated: f.deprecated.unwrap_or(false),
        }
    }
}

impl From<&CaskRecord> for UnifiedPackage {
    fn from(c: &CaskRecord) -> Self {
        Self {
            identity: c.id.clone(),
            name: c.name.clone(),
            qualified_name: c.full_name.clone(),
            kind: PackageKind::Cask,
            description: c.desc.clone(),
            homepage: c.homepage.clone(),
            version: c.version.clone(),
            is_installed: has_installs(c.installed.as_ref()),
            is_outdated: c.outdated.unwrap_or(false),
            is_deprecated: c.deprecated.unwrap_or(false),
        }
    }
}

/// What: A tap after fallbacks are applied.
///
/// Details:
/// - `id` falls back to `name`.
/// - `user` / `repo` fall back to the two halves of `name` split on `/`.
/// - `path` defaults to empty.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TapRecord {
    /// Stable identity.
    pub id: String,
    /// `user/repo` name.
    pub name: String,
    /// Owning user or organisation.
    pub user: String,
    /// Repository name.
    pub repo: String,
    /// Local checkout path.
    pub path: String,
    /// Git remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Maintained by the backend project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official: Option<bool>,
    /// Remote differs from the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_remote: Option<bool>,
    /// Pinned tap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl From<RawTap> for TapRecord {
    fn from(raw: RawTap) -> Self {
        let (user_part, repo_part) = match raw.name.split_once('/') {
            Some((user, repo)) => (user.to_string(), repo.to_string()),
            None => (raw.name.clone(), String::new()),
        };
        Self {
            id: raw.id.unwrap_or_else(|| raw.name.clone()),
            user: raw.user.unwrap_or(user_part),
            repo: raw.repo.unwrap_or(repo_part),
            path: raw.path.unwrap_or_default(),
            name: raw.name,
            remote: raw.remote,
            official: raw.official,
            custom_remote: raw.custom_remote,
            pinned: raw.pinned,
        }
    }
}
