//! `settings.conf` model and parser.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use super::parsing::{parse_bool, parse_key_value, skip_comment_or_empty};
use super::paths;
use crate::cache::{CacheKey, DEFAULT_TTL, ResultCache};
use crate::coordinator::CoordinatorOptions;

/// Prefix marking a runner environment override, e.g. `env.HOMEBREW_NO_ANALYTICS = 1`.
const ENV_PREFIX: &str = "env.";

/// What: Parsed user settings.
///
/// Details:
/// - Unknown keys and unparsable values are logged and ignored, leaving the
///   default in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Explicit backend executable; skips location when set.
    pub brew_path: Option<PathBuf>,
    /// Cache root override.
    pub cache_dir: Option<PathBuf>,
    /// TTL for cache keys without their own setting.
    pub cache_ttl: Duration,
    /// TTL for installed formulae and casks.
    pub cache_ttl_installed: Option<Duration>,
    /// TTL for outdated formulae and casks.
    pub cache_ttl_outdated: Option<Duration>,
    /// TTL for taps.
    pub cache_ttl_taps: Option<Duration>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Export `HOMEBREW_NO_AUTO_UPDATE=1` to every backend invocation.
    pub no_auto_update: bool,
    /// Extra environment for every backend invocation.
    pub env: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brew_path: None,
            cache_dir: None,
            cache_ttl: DEFAULT_TTL,
            cache_ttl_installed: None,
            cache_ttl_outdated: None,
            cache_ttl_taps: None,
            log_level: "info".to_string(),
            no_auto_update: false,
            env: BTreeMap::new(),
        }
    }
}

fn parse_secs(key: &str, value: &str, warnings: &mut Vec<String>) -> Option<Duration> {
    match value.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warnings.push(format!("ignoring invalid duration for {key}: {value:?} ({e})"));
            None
        }
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// What: Parse settings from `settings.conf` content.
///
/// Inputs:
/// - `content`: File contents.
///
/// Output:
/// - [`Settings`] with every recognised key applied over the defaults.
///
/// Details:
/// - Keys are case-insensitive and `-`, `.` and spaces are treated as `_`,
///   except for `env.<NAME>` keys whose variable name is kept verbatim.
/// - Later lines override earlier ones.
#[must_use]
pub fn parse_settings(content: &str) -> Settings {
    let (settings, warnings) = parse_settings_with_warnings(content);
    for warning in &warnings {
        warn!("{warning}");
    }
    settings
}

/// What: Parse settings and return the problems instead of logging them.
///
/// Output:
/// - Parsed [`Settings`] and one message per ignored value.
///
/// Details:
/// - Lets callers report problems once logging is set up.
#[must_use]
pub fn parse_settings_with_warnings(content: &str) -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    for line in content.lines() {
        if skip_comment_or_empty(line) {
            continue;
        }
        let Some((raw_key, val)) = parse_key_value(line) else {
            debug!(line, "ignoring settings line without '='");
            continue;
        };
        if let Some(name) = raw_key.strip_prefix(ENV_PREFIX) {
            if name.is_empty() {
                warnings.push("ignoring env override with empty name".to_string());
            } else {
                settings.env.insert(name.to_string(), val);
            }
            continue;
        }
        let key = raw_key.to_lowercase().replace(['.', '-', ' '], "_");
        match key.as_str() {
            "brew_path" | "backend_path" => settings.brew_path = non_empty_path(&val),
            "cache_dir" => settings.cache_dir = non_empty_path(&val),
            "cache_ttl_secs" | "cache_ttl" => {
                if let Some(ttl) = parse_secs(&key, &val, &mut warnings) {
                    settings.cache_ttl = ttl;
                }
            }
            "cache_ttl_installed_secs" => {
                settings.cache_ttl_installed =
                    parse_secs(&key, &val, &mut warnings).or(settings.cache_ttl_installed);
            }
            "cache_ttl_outdated_secs" => {
                settings.cache_ttl_outdated =
                    parse_secs(&key, &val, &mut warnings).or(settings.cache_ttl_outdated);
            }
            "cache_ttl_taps_secs" => {
                settings.cache_ttl_taps =
                    parse_secs(&key, &val, &mut warnings).or(settings.cache_ttl_taps);
            }
            "log_level" => {
                if !val.is_empty() {
                    settings.log_level = val;
                }
            }
            "no_auto_update" => settings.no_auto_update = parse_bool(&val),
            _ => warnings.push(format!("ignoring unknown settings key {key}")),
        }
    }
    (settings, warnings)
}

impl Settings {
    /// What: Read settings from `path`.
    ///
    /// Output:
    /// - Parsed settings, or defaults when the file is missing or unreadable.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let (settings, warnings) = Self::load_with_warnings(path);
        for warning in &warnings {
            warn!("{warning}");
        }
        settings
    }

    /// What: Read settings from `path` without logging problems.
    ///
    /// Output:
    /// - Settings as [`Settings::load`] returns them, plus every problem found
    ///   (unreadable file, invalid values) for the caller to report.
    #[must_use]
    pub fn load_with_warnings(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded settings");
                parse_settings_with_warnings(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file; using defaults");
                (Self::default(), Vec::new())
            }
            Err(e) => (
                Self::default(),
                vec![format!(
                    "failed to read settings at {}: {e}; using defaults",
                    path.display()
                )],
            ),
        }
    }

    /// Read settings from the default location.
    #[must_use]
    pub fn load_default() -> Self {
        Self::load(&paths::settings_path())
    }

    /// [`Settings::load_with_warnings`] on the default location.
    #[must_use]
    pub fn load_default_with_warnings() -> (Self, Vec<String>) {
        Self::load_with_warnings(&paths::settings_path())
    }

    /// Environment overrides passed to the runner.
    ///
    /// Explicit `env.*` entries win over `no_auto_update`.
    #[must_use]
    pub fn runner_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if self.no_auto_update {
            env.insert("HOMEBREW_NO_AUTO_UPDATE".to_string(), "1".to_string());
        }
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Cache root from settings or the XDG default.
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(paths::cache_dir)
    }

    /// Cache configured with the default and per-category TTLs.
    #[must_use]
    pub fn build_cache(&self) -> ResultCache {
        let mut cache = ResultCache::new(self.cache_root()).with_default_ttl(self.cache_ttl);
        let per_key = [
            (CacheKey::InstalledFormulae, self.cache_ttl_installed),
            (CacheKey::InstalledCasks, self.cache_ttl_installed),
            (CacheKey::OutdatedFormulae, self.cache_ttl_outdated),
            (CacheKey::OutdatedCasks, self.cache_ttl_outdated),
            (CacheKey::Taps, self.cache_ttl_taps),
        ];
        for (key, ttl) in per_key {
            if let Some(ttl) = ttl {
                cache = cache.with_ttl(key, ttl);
            }
        }
        cache
    }

    /// Coordinator options reflecting these settings.
    #[must_use]
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        let mut options = CoordinatorOptions::new(self.build_cache());
        options.backend_path.clone_from(&self.brew_path);
        options.env = self.runner_env();
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
# brewdeck settings
brew_path = /usr/local/bin/brew
cache-dir = /tmp/brewdeck-cache   // inline comment
cache_ttl_secs = 120
cache_ttl_taps_secs = 86400
cache_ttl_outdated_secs = soon
LOG_LEVEL = brewdeck=debug
no_auto_update = yes
env.HOMEBREW_NO_ANALYTICS = 1
env.HOMEBREW_NO_AUTO_UPDATE = 0
; legacy comment
unknown_key = whatever
not a setting
";

    #[test]
    /// What: Every recognised key is applied, bad values fall back.
    ///
    /// Inputs:
    /// - Sample file with comments, odd key spellings, an invalid TTL and an
    ///   unknown key.
    ///
    /// Output:
    /// - Parsed fields as written; invalid outdated TTL stays unset.
    fn parse_sample_settings() {
        let s = parse_settings(SAMPLE);
        assert_eq!(s.brew_path, Some(PathBuf::from("/usr/local/bin/brew")));
        assert_eq!(s.cache_dir, Some(PathBuf::from("/tmp/brewdeck-cache")));
        assert_eq!(s.cache_ttl, Duration::from_secs(120));
        assert_eq!(s.cache_ttl_taps, Some(Duration::from_secs(86_400)));
        assert_eq!(s.cache_ttl_outdated, None);
        assert_eq!(s.cache_ttl_installed, None);
        assert_eq!(s.log_level, "brewdeck=debug");
        assert!(s.no_auto_update);
        assert_eq!(s.env.get("HOMEBREW_NO_ANALYTICS").map(String::as_str), Some("1"));
    }

    #[test]
    /// What: Runner environment merges the auto-update switch with explicit entries.
    ///
    /// Inputs:
    /// - Sample settings where `env.HOMEBREW_NO_AUTO_UPDATE` contradicts the switch.
    ///
    /// Output:
    /// - Explicit entry wins; other entries present.
    fn runner_env_prefers_explicit_entries() {
        let env = parse_settings(SAMPLE).runner_env();
        assert_eq!(env.get("HOMEBREW_NO_AUTO_UPDATE").map(String::as_str), Some("0"));
        assert_eq!(env.get("HOMEBREW_NO_ANALYTICS").map(String::as_str), Some("1"));

        let env = parse_settings("no_auto_update = true").runner_env();
        assert_eq!(env.get("HOMEBREW_NO_AUTO_UPDATE").map(String::as_str), Some("1"));
        assert!(Settings::default().runner_env().is_empty());
    }

    #[test]
    /// What: Cache built from settings carries the configured TTLs.
    ///
    /// Inputs:
    /// - Default TTL 120s, installed TTL 30s.
    ///
    /// Output:
    /// - Both installed keys use 30s, others 120s; root from `cache_dir`.
    fn build_cache_applies_ttls() {
        let s = parse_settings("cache_ttl_secs=120\ncache_ttl_installed_secs=30\ncache_dir=/tmp/x");
        let cache = s.build_cache();
        assert_eq!(cache.root(), Path::new("/tmp/x"));
        assert_eq!(cache.ttl_for(CacheKey::InstalledFormulae), Duration::from_secs(30));
        assert_eq!(cache.ttl_for(CacheKey::InstalledCasks), Duration::from_secs(30));
        assert_eq!(cache.ttl_for(CacheKey::Taps), Duration::from_secs(120));
    }

    #[test]
    /// What: Coordinator options reflect path and environment settings.
    ///
    /// Inputs:
    /// - `brew_path` and `no_auto_update` set.
    ///
    /// Output:
    /// - Options carry the path and the environment override.
    fn coordinator_options_from_settings() {
        let s = parse_settings("brew_path=/opt/homebrew/bin/brew\nno_auto_update=on");
        let options = s.coordinator_options();
        assert_eq!(options.backend_path, Some(PathBuf::from("/opt/homebrew/bin/brew")));
        assert_eq!(
            options.env.get("HOMEBREW_NO_AUTO_UPDATE").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    /// What: Missing file yields defaults; present file is parsed.
    ///
    /// Inputs:
    /// - Nonexistent path, then a temp file with one key.
    ///
    /// Output:
    /// - Defaults, then the parsed value.
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.conf");
        assert_eq!(Settings::load(&path), Settings::default());
        std::fs::write(&path, "log_level = warn\n").expect("write");
        assert_eq!(Settings::load(&path).log_level, "warn");
    }

    #[test]
    /// What: URL-valued environment overrides reach the runner unchanged.
    ///
    /// Inputs:
    /// - `env.HOMEBREW_BOTTLE_DOMAIN` set to a URL, with and without a comment;
    ///   `cache_dir` containing `#`.
    ///
    /// Output:
    /// - Full URL in the runner environment; path kept whole.
    fn url_env_override_is_not_truncated() {
        let s = parse_settings(
            "env.HOMEBREW_BOTTLE_DOMAIN = https://mirror.example.com/bottles\ncache_dir = /tmp/brew#1\n",
        );
        assert_eq!(
            s.runner_env().get("HOMEBREW_BOTTLE_DOMAIN").map(String::as_str),
            Some("https://mirror.example.com/bottles")
        );
        assert_eq!(s.cache_dir, Some(PathBuf::from("/tmp/brew#1")));

        let s = parse_settings("env.HOMEBREW_API_DOMAIN = https://api.example.com // mirror\n");
        assert_eq!(
            s.env.get("HOMEBREW_API_DOMAIN").map(String::as_str),
            Some("https://api.example.com")
        );
    }

    #[test]
    /// What: Problems are returned to the caller instead of being dropped.
    ///
    /// Inputs:
    /// - Invalid TTL and an env override with an empty name; a path that is a
    ///   directory, so reading it fails.
    ///
    /// Output:
    /// - One message per problem; defaults kept for the bad values.
    fn warnings_are_returned() {
        let (s, warnings) =
            parse_settings_with_warnings("cache_ttl_secs = soon\nenv. = 1\nlog_level = warn\n");
        assert_eq!(s.cache_ttl, DEFAULT_TTL);
        assert_eq!(s.log_level, "warn");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("cache_ttl_secs"), "{warnings:?}");

        let dir = tempfile::tempdir().expect("tempdir");
        let (s, warnings) = Settings::load_with_warnings(dir.path());
        assert_eq!(s, Settings::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("failed to read settings"), "{warnings:?}");

        let (_, warnings) = Settings::load_with_warnings(&dir.path().join("absent.conf"));
        assert!(warnings.is_empty());
    }

    #[test]
    /// What: Empty path values clear an earlier setting.
    ///
    /// Inputs:
    /// - `brew_path` set then blanked.
    ///
    /// Output:
    /// - `None`.
    fn blank_path_clears_setting() {
        let s = parse_settings("brew_path=/x\nbrew_path=");
        assert_eq!(s.brew_path, None);
    }
}
