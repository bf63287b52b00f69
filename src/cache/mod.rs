//! Persistent cache of decoded backend responses with TTL enforced on read.
//!
//! Each key owns a value file and a metadata sidecar holding the save
//! timestamp. Saves write the value before the sidecar, each through a
//! temporary file and a rename, so a reader never sees a sidecar that vouches
//! for a value that is not there yet.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// TTL applied when neither the caller nor a per-key override specifies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Suffix appended to a value file name to form its sidecar.
const META_SUFFIX: &str = ".meta";

/// Logical response categories that may be cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Formulae from `list --json=v2`.
    InstalledFormulae,
    /// Casks from `list --json=v2`.
    InstalledCasks,
    /// Formulae from `outdated --json=v2`.
    OutdatedFormulae,
    /// Casks from `outdated --json=v2`.
    OutdatedCasks,
    /// Records from `tap --json`.
    Taps,
}

impl CacheKey {
    /// Every key, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::InstalledFormulae,
        Self::InstalledCasks,
        Self::OutdatedFormulae,
        Self::OutdatedCasks,
        Self::Taps,
    ];

    /// Stable identifier used in logs and settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstalledFormulae => "installed-formulae",
            Self::InstalledCasks => "installed-casks",
            Self::OutdatedFormulae => "outdated-formulae",
            Self::OutdatedCasks => "outdated-casks",
            Self::Taps => "taps",
        }
    }

    /// Value file name under the cache root.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::InstalledFormulae => "installed_formulae.json",
            Self::InstalledCasks => "installed_casks.json",
            Self::OutdatedFormulae => "outdated_formulae.json",
            Self::OutdatedCasks => "outdated_casks.json",
            Self::Taps => "taps.json",
        }
    }
}

/// Sidecar contents.
#[derive(Serialize, Deserialize, Debug)]
struct CacheMetadata {
    /// RFC 3339 save time.
    timestamp: String,
}

impl CacheMetadata {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Cache failures other than "nothing cached".
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The value could not be serialized.
    #[error("failed to encode cache entry `{key}`: {source}")]
    Encode {
        /// Cache key.
        key: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A present, unexpired entry could not be decoded.
    #[error("cache entry `{key}` is corrupt: {source}")]
    Decode {
        /// Cache key.
        key: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// What: Keyed, TTL-governed store of serialized payloads under one directory.
///
/// Details:
/// - Expiry is checked on `load`; expired entries are deleted there. There is
///   no background sweep.
/// - Mutations (save, evict, remove, clear) are serialized through one async
///   mutex so value/sidecar pairs written by this process never interleave.
#[derive(Debug)]
pub struct ResultCache {
    root: PathBuf,
    default_ttl: Duration,
    ttl_overrides: HashMap<CacheKey, Duration>,
    write_lock: Mutex<()>,
}

impl ResultCache {
    /// Cache rooted at `root` using [`DEFAULT_TTL`]. The directory is created
    /// lazily on the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_ttl: DEFAULT_TTL,
            ttl_overrides: HashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the TTL used for keys without an override.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set a TTL for one key.
    #[must_use]
    pub fn with_ttl(mut self, key: CacheKey, ttl: Duration) -> Self {
        self.ttl_overrides.insert(key, ttl);
        self
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// TTL applied to `key` when `load` is called without one.
    #[must_use]
    pub fn ttl_for(&self, key: CacheKey) -> Duration {
        self.ttl_overrides
            .get(&key)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    fn value_path(&self, key: CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn meta_path(&self, key: CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{META_SUFFIX}", key.file_name()))
    }

    /// What: Serialize `value` and store it under `key` with a fresh timestamp.
    ///
    /// Inputs:
    /// - `key`: Cache slot; any previous entry is overwritten.
    /// - `value`: Payload to serialize as JSON.
    ///
    /// # Errors
    /// - [`CacheError::Encode`] when serialization fails.
    /// - [`CacheError::Io`] when the directory or files cannot be written.
    pub async fn save<T>(&self, key: CacheKey, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value).map_err(|source| CacheError::Encode {
            key: key.as_str(),
            source,
        })?;
        let meta = serde_json::to_vec(&CacheMetadata::now()).map_err(|source| {
            CacheError::Encode {
                key: key.as_str(),
                source,
            }
        })?;

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| io_error(&self.root, source))?;
        write_atomic(&self.value_path(key), &body).await?;
        write_atomic(&self.meta_path(key), &meta).await?;
        debug!(key = key.as_str(), bytes = body.len(), "saved cache entry");
        Ok(())
    }

    /// What: Read the entry for `key` if it exists and is younger than the TTL.
    ///
    /// Inputs:
    /// - `key`: Cache slot.
    /// - `ttl`: Maximum age; `None` uses [`ResultCache::ttl_for`].
    ///
    /// Output:
    /// - `Ok(Some(value))` for a fresh entry, `Ok(None)` when absent or expired.
    ///
    /// # Errors
    /// - [`CacheError::Decode`] when a fresh entry cannot be decoded as `T`.
    /// - [`CacheError::Io`] for filesystem failures other than "not found".
    ///
    /// Details:
    /// - An entry whose sidecar is missing or unreadable is treated as absent
    ///   and deleted, never as ageless.
    /// - A zero TTL never serves.
    /// - The sidecar is read before the value so a concurrent save can only
    ///   make the entry look older, never newer.
    pub async fn load<T>(&self, key: CacheKey, ttl: Option<Duration>) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(key));
        let saved_at = self.read_saved_at(key).await;
        let value_path = self.value_path(key);
        let body = match fs::read(&value_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&value_path, source)),
        };

        match saved_at {
            Some(saved_at) if !is_expired(saved_at, Utc::now(), ttl) => {}
            Some(saved_at) => {
                debug!(key = key.as_str(), saved_at = %saved_at, ttl_secs = ttl.as_secs(), "cache entry expired");
                self.evict_if_stale(key, ttl).await?;
                return Ok(None);
            }
            None => {
                warn!(key = key.as_str(), "cache entry has no readable metadata; discarding");
                self.evict_if_stale(key, ttl).await?;
                return Ok(None);
            }
        }

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: key.as_str(),
                source,
            })
    }

    /// Delete value and sidecar for `key`. Missing files are not an error.
    ///
    /// # Errors
    /// - [`CacheError::Io`] when a present file cannot be removed.
    pub async fn remove(&self, key: CacheKey) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        self.remove_pair(key).await
    }

    /// What: Delete every entry under the cache root.
    ///
    /// # Errors
    /// - [`CacheError::Io`] when the root cannot be listed or an entry cannot
    ///   be removed.
    ///
    /// Details:
    /// - A missing root counts as already clear.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(io_error(&self.root, source)),
        };
        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| io_error(&self.root, source))?
        {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let outcome = if is_dir {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match outcome {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(io_error(&path, source)),
            }
        }
        info!(root = %self.root.display(), removed, "cleared cache");
        Ok(())
    }

    /// Read and parse the sidecar timestamp; any failure is `None`.
    async fn read_saved_at(&self, key: CacheKey) -> Option<DateTime<Utc>> {
        let raw = fs::read(self.meta_path(key)).await.ok()?;
        let meta: CacheMetadata = serde_json::from_slice(&raw).ok()?;
        meta.saved_at()
    }

    /// Remove the entry unless a concurrent save refreshed it since it was read.
    async fn evict_if_stale(&self, key: CacheKey, ttl: Duration) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let saved_at = self.read_saved_at(key).await;
        if saved_at.is_none_or(|t| is_expired(t, Utc::now(), ttl)) {
            self.remove_pair(key).await?;
        }
        Ok(())
    }

    /// Caller must hold `write_lock`.
    async fn remove_pair(&self, key: CacheKey) -> Result<(), CacheError> {
        remove_if_present(&self.value_path(key)).await?;
        remove_if_present(&self.meta_path(key)).await?;
        debug!(key = key.as_str(), "removed cache entry");
        Ok(())
    }
}

/// What: Decide whether an entry saved at `saved_at` is past `ttl` at `now`.
///
/// Details:
/// - Zero TTL is always expired.
/// - A timestamp in the future (clock moved backwards) counts as fresh.
fn is_expired(saved_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return true;
    }
    now.signed_duration_since(saved_at)
        .to_std()
        .is_ok_and(|age| age > ttl)
}

/// Monotonic suffix for temporary file names within this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".tmp-{}-{seq}", std::process::id()));
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes)
        .await
        .map_err(|source| io_error(&tmp, source))?;
    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(io_error(path, source));
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<(), CacheError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}
