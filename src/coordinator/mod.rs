//! Orchestration of locator, runner, cache and decoder into observable state.
//!
//! The [`Coordinator`] is the only writer of the published [`Snapshot`].
//! Read flows (installed, outdated, taps, search) never return errors; their
//! outcome shows up in the snapshot. Write flows (install, uninstall,
//! upgrade, update) return [`ManagerError`] and refresh the affected lists on
//! success.

mod error;

pub use error::ManagerError;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{
    BrewRunner, ExecutableLocation, InstallOutcome, Installer, Locator, OutputSink,
    ProcessRunner, RunnerError, query_prefix,
};
use crate::backend::locate::PROGRAM;
use crate::cache::{CacheError, CacheKey, ResultCache};
use crate::model::{PackageKind, UnifiedPackage, decode_envelope, decode_taps};
use crate::state::{FetchKind, FetchPhase, Snapshot};

/// Text published when a read flow runs without a backend.
pub const UNAVAILABLE_MESSAGE: &str = "backend not available";

/// What: Construction parameters for a [`Coordinator`].
///
/// Details:
/// - When `backend_path` is set it is used as-is and the backend counts as
///   available only if that file exists; otherwise `locator` decides.
#[derive(Debug)]
pub struct CoordinatorOptions {
    /// Explicit executable path.
    pub backend_path: Option<PathBuf>,
    /// Cache for list results.
    pub cache: ResultCache,
    /// Environment overrides applied to every backend invocation.
    pub env: HashMap<String, String>,
    /// Search strategy used at construction and by [`Coordinator::relocate`].
    pub locator: Locator,
    /// Bootstrap used by [`Coordinator::install_backend`].
    pub installer: Installer,
}

impl CoordinatorOptions {
    /// Defaults around the given cache.
    #[must_use]
    pub fn new(cache: ResultCache) -> Self {
        Self {
            backend_path: None,
            cache,
            env: HashMap::new(),
            locator: Locator::default(),
            installer: Installer::default(),
        }
    }
}

/// Runner currently in use plus what is known about it.
struct Backend {
    runner: Arc<dyn BrewRunner>,
    path: Option<PathBuf>,
    available: bool,
}

impl Backend {
    fn from_location(location: Option<&ExecutableLocation>, env: &HashMap<String, String>) -> Self {
        match location {
            Some(loc) => Self {
                runner: Arc::new(ProcessRunner::new(&loc.path).with_env(env.clone())),
                path: Some(loc.path.clone()),
                available: true,
            },
            None => Self {
                runner: Arc::new(ProcessRunner::new(PROGRAM).with_env(env.clone())),
                path: None,
                available: false,
            },
        }
    }

    fn display_path(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.to_string_lossy().into_owned())
    }
}

/// Which package list a refresh targets.
#[derive(Clone, Copy, Debug)]
enum PackageList {
    Installed,
    Outdated,
}

impl PackageList {
    const fn fetch_kind(self) -> FetchKind {
        match self {
            Self::Installed => FetchKind::Installed,
            Self::Outdated => FetchKind::Outdated,
        }
    }

    const fn keys(self) -> (CacheKey, CacheKey) {
        match self {
            Self::Installed => (CacheKey::InstalledFormulae, CacheKey::InstalledCasks),
            Self::Outdated => (CacheKey::OutdatedFormulae, CacheKey::OutdatedCasks),
        }
    }

    fn args(self) -> Vec<String> {
        let verb = match self {
            Self::Installed => "list",
            Self::Outdated => "outdated",
        };
        vec![verb.to_string(), "--json=v2".to_string()]
    }

    fn assign(self, snapshot: &mut Snapshot, packages: Vec<UnifiedPackage>) {
        match self {
            Self::Installed => snapshot.installed_packages = packages,
            Self::Outdated => snapshot.outdated_packages = packages,
        }
    }
}

/// Mutating backend operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mutation {
    Install,
    Uninstall,
    Upgrade,
    UpgradeAll,
    Update,
}

impl Mutation {
    const fn verb(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Upgrade | Self::UpgradeAll => "upgrade",
            Self::Update => "update",
        }
    }

    fn failure(self, diagnostic: String) -> ManagerError {
        match self {
            Self::Install => ManagerError::InstallFailed(diagnostic),
            Self::Uninstall => ManagerError::UninstallFailed(diagnostic),
            Self::Upgrade | Self::UpgradeAll => ManagerError::UpgradeFailed(diagnostic),
            Self::Update => ManagerError::UpdateFailed(diagnostic),
        }
    }
}

/// What: Build the argument list for a mutating command.
///
/// Inputs:
/// - `verb`: `install`, `uninstall`, `upgrade`, ...
/// - `package`: Target package, or `None` for whole-system operations.
///
/// Output:
/// - `verb`, then `--cask` for casks, then the qualified name.
#[must_use]
pub fn mutation_args(verb: &str, package: Option<&UnifiedPackage>) -> Vec<String> {
    let mut args = vec![verb.to_string()];
    if let Some(pkg) = package {
        if pkg.kind == PackageKind::Cask {
            args.push("--cask".to_string());
        }
        args.push(pkg.qualified_name.clone());
    }
    args
}

/// What: One unit of in-flight work counted towards `is_loading`.
///
/// Details:
/// - Finishing through [`InFlight::complete`] or [`InFlight::fail`] releases
///   the count in the same publish as the result.
/// - Dropping it unfinished (a cancelled or timed-out caller) still releases
///   the count and marks the fetch, if any, as failed.
struct InFlight<'a> {
    coordinator: &'a Coordinator,
    kind: Option<FetchKind>,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn enter(
        coordinator: &'a Coordinator,
        kind: Option<FetchKind>,
        update: impl FnOnce(&mut Snapshot),
    ) -> Self {
        coordinator.state.send_modify(|s| {
            let n = coordinator.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            s.is_loading = n > 0;
            update(s);
        });
        Self {
            coordinator,
            kind,
            finished: false,
        }
    }

    fn leave(&mut self, update: impl FnOnce(&mut Snapshot)) {
        self.finished = true;
        let in_flight = &self.coordinator.in_flight;
        self.coordinator.state.send_modify(|s| {
            update(s);
            let n = in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            s.is_loading = n > 0;
        });
    }

    /// Finish successfully, applying `update` in the same publish.
    fn complete(mut self, update: impl FnOnce(&mut Snapshot)) {
        let kind = self.kind;
        self.leave(|s| {
            update(s);
            if let Some(kind) = kind {
                s.phases.set(kind, FetchPhase::Ready);
            }
        });
    }

    /// Finish with an error. Data already published is kept unless `update`
    /// says otherwise.
    fn fail(mut self, message: String, update: impl FnOnce(&mut Snapshot)) {
        let kind = self.kind;
        if let Some(kind) = kind {
            warn!(fetch = kind.as_str(), error = %message, "fetch failed");
        }
        self.leave(|s| {
            update(s);
            s.last_error = Some(message);
            if let Some(kind) = kind {
                s.phases.set(kind, FetchPhase::Failed);
            }
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let kind = self.kind;
        warn!(fetch = ?kind, "in-flight work dropped before finishing");
        self.leave(|s| {
            if let Some(kind) = kind {
                s.phases.set(kind, FetchPhase::Failed);
            }
        });
    }
}

/// Single owner of backend state; share it behind an `Arc`.
pub struct Coordinator {
    backend: RwLock<Backend>,
    cache: ResultCache,
    locator: Locator,
    installer: Installer,
    env: HashMap<String, String>,
    state: watch::Sender<Snapshot>,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("cache", &self.cache)
            .field("locator", &self.locator)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// What: Resolve the backend and build a coordinator.
    ///
    /// Details:
    /// - Location happens once here; later changes need [`Coordinator::relocate`].
    #[must_use]
    pub fn new(options: CoordinatorOptions) -> Self {
        let backend = match &options.backend_path {
            Some(path) => {
                let available = path.is_file();
                if !available {
                    warn!(path = %path.display(), "configured backend path does not exist");
                }
                Backend {
                    runner: Arc::new(ProcessRunner::new(path).with_env(options.env.clone())),
                    path: Some(path.clone()),
                    available,
                }
            }
            None => Backend::from_location(options.locator.locate().as_ref(), &options.env),
        };
        Self::assemble(backend, options)
    }

    /// What: Build a coordinator around a caller-supplied runner.
    ///
    /// Inputs:
    /// - `runner`: Any [`BrewRunner`] implementation.
    /// - `backend_path`: Reported path; `None` marks the backend unavailable.
    /// - `cache`: Cache for list results.
    #[must_use]
    pub fn with_runner(
        runner: Arc<dyn BrewRunner>,
        backend_path: Option<PathBuf>,
        cache: ResultCache,
    ) -> Self {
        let backend = Backend {
            runner,
            available: backend_path.is_some(),
            path: backend_path,
        };
        Self::assemble(backend, CoordinatorOptions::new(cache))
    }

    fn assemble(backend: Backend, options: CoordinatorOptions) -> Self {
        let initial = Snapshot {
            is_backend_available: backend.available,
            backend_path: backend.display_path(),
            ..Snapshot::default()
        };
        info!(
            available = backend.available,
            path = ?backend.path,
            cache_root = %options.cache.root().display(),
            "coordinator ready"
        );
        let (state, _) = watch::channel(initial);
        Self {
            backend: RwLock::new(backend),
            cache: options.cache,
            locator: options.locator,
            installer: options.installer,
            env: options.env,
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Whether a backend executable is known.
    #[must_use]
    pub fn is_backend_available(&self) -> bool {
        self.backend
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .available
    }

    /// The cache backing list refreshes.
    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn runner(&self) -> Option<Arc<dyn BrewRunner>> {
        let backend = self
            .backend
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        backend.available.then(|| Arc::clone(&backend.runner))
    }

    /// Start a fetch: bump the in-flight count, mark `kind` loading and clear
    /// the last error. Without a backend the fetch fails immediately.
    fn begin(&self, kind: FetchKind) -> Option<(Arc<dyn BrewRunner>, InFlight<'_>)> {
        let Some(runner) = self.runner() else {
            debug!(fetch = kind.as_str(), "fetch skipped: backend unavailable");
            self.state.send_modify(|s| {
                s.last_error = Some(UNAVAILABLE_MESSAGE.to_string());
                s.phases.set(kind, FetchPhase::Failed);
                if kind == FetchKind::Search {
                    s.search_results.clear();
                }
            });
            return None;
        };
        let flight = InFlight::enter(self, Some(kind), |s| {
            s.last_error = None;
            s.phases.set(kind, FetchPhase::Loading);
        });
        Some((runner, flight))
    }

    /// Refresh installed formulae and casks. See [`Coordinator::refresh_outdated`].
    pub async fn refresh_installed(&self) {
        self.refresh_packages(PackageList::Installed).await;
    }

    /// What: Refresh the outdated list.
    ///
    /// Details:
    /// - Publishes the cached list first when one is fresh, then always runs
    ///   the live command and replaces the list with its result.
    /// - On failure the previously published list stays and `last_error`
    ///   carries the diagnostic.
    /// - Every record in an outdated report is marked outdated unless it
    ///   carries its own flag.
    pub async fn refresh_outdated(&self) {
        self.refresh_packages(PackageList::Outdated).await;
    }

    async fn refresh_packages(&self, list: PackageList) {
        let kind = list.fetch_kind();
        let Some((runner, flight)) = self.begin(kind) else {
            return;
        };

        let (formula_key, cask_key) = list.keys();
        let cached_formulae = self.load_cached::<Vec<UnifiedPackage>>(formula_key).await;
        let cached_casks = self.load_cached::<Vec<UnifiedPackage>>(cask_key).await;
        if cached_formulae.is_some() || cached_casks.is_some() {
            let mut cached = cached_formulae.unwrap_or_default();
            cached.extend(cached_casks.unwrap_or_default());
            debug!(fetch = kind.as_str(), count = cached.len(), "publishing cached list");
            self.state.send_modify(|s| list.assign(s, cached));
        }

        let result = match runner.run(&list.args()).await {
            Ok(result) => result,
            Err(e) => {
                flight.fail(e.to_string(), |_| {});
                return;
            }
        };
        if !result.succeeded() {
            flight.fail(result.diagnostic_text().to_string(), |_| {});
            return;
        }
        let mut envelope = match decode_envelope(&result.stdout) {
            Ok(envelope) => envelope,
            Err(e) => {
                flight.fail(format!("failed to decode {} list: {e}", kind.as_str()), |_| {});
                return;
            }
        };
        if matches!(list, PackageList::Outdated) {
            envelope.mark_outdated();
        }
        let formulae = envelope.formula_packages();
        let casks = envelope.cask_packages();
        self.store(formula_key, &formulae).await;
        self.store(cask_key, &casks).await;

        let mut packages = formulae;
        packages.extend(casks);
        info!(fetch = kind.as_str(), count = packages.len(), skipped = envelope.skipped, "list refreshed");
        flight.complete(|s| list.assign(s, packages));
    }

    /// Refresh taps with the same cache-then-live flow as package lists.
    pub async fn refresh_taps(&self) {
        let kind = FetchKind::Taps;
        let Some((runner, flight)) = self.begin(kind) else {
            return;
        };
        if let Some(cached) = self.load_cached(CacheKey::Taps).await {
            self.state.send_modify(|s| s.taps = cached);
        }

        let args = vec!["tap".to_string(), "--json".to_string()];
        let outcome = match runner.run(&args).await {
            Ok(result) if result.succeeded() => {
                decode_taps(&result.stdout).map_err(|e| format!("failed to decode taps: {e}"))
            }
            Ok(result) => Err(result.diagnostic_text().to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(taps) => {
                self.store(CacheKey::Taps, &taps).await;
                info!(count = taps.len(), "taps refreshed");
                flight.complete(|s| s.taps = taps);
            }
            Err(message) => flight.fail(message, |_| {}),
        }
    }

    /// What: Search the backend for `query`.
    ///
    /// Details:
    /// - Always live, never cached.
    /// - An empty or whitespace query clears the results and resets the
    ///   search phase to idle without running anything.
    /// - A failed search clears the results.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.state.send_modify(|s| {
                s.search_results.clear();
                s.phases.set(FetchKind::Search, FetchPhase::Idle);
            });
            return;
        }
        let kind = FetchKind::Search;
        let Some((runner, flight)) = self.begin(kind) else {
            return;
        };
        let args = vec![
            "search".to_string(),
            "--json=v2".to_string(),
            query.to_string(),
        ];
        let outcome = match runner.run(&args).await {
            Ok(result) if result.succeeded() => decode_envelope(&result.stdout)
                .map(|envelope| envelope.packages())
                .map_err(|e| format!("failed to decode search results: {e}")),
            Ok(result) => Err(result.diagnostic_text().to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(results) => {
                info!(query, count = results.len(), "search finished");
                flight.complete(|s| s.search_results = results);
            }
            Err(message) => flight.fail(message, |s| s.search_results.clear()),
        }
    }

    /// Refresh installed, outdated and taps concurrently.
    pub async fn refresh_all(&self) {
        tokio::join!(
            self.refresh_installed(),
            self.refresh_outdated(),
            self.refresh_taps()
        );
    }

    /// Load a cache entry, treating corruption as a miss.
    async fn load_cached<T: serde::de::DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        match self.cache.load::<T>(key, None).await {
            Ok(value) => value,
            Err(CacheError::Decode { .. }) => {
                warn!(key = key.as_str(), "discarding corrupt cache entry");
                if let Err(e) = self.cache.remove(key).await {
                    warn!(key = key.as_str(), error = %e, "failed to remove corrupt cache entry");
                }
                None
            }
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "cache read failed");
                None
            }
        }
    }

    async fn store<T: serde::Serialize + ?Sized>(&self, key: CacheKey, value: &T) {
        if let Err(e) = self.cache.save(key, value).await {
            warn!(key = key.as_str(), error = %e, "cache write failed");
        }
    }

    /// What: Install `package`, then refresh the installed list.
    ///
    /// Inputs:
    /// - `package`: Target; casks get `--cask`.
    /// - `sink`: Optional live output receiver.
    ///
    /// # Errors
    /// - [`ManagerError::BackendUnavailable`] without a backend.
    /// - [`ManagerError::InstallFailed`] carrying the diagnostic text.
    pub async fn install(
        &self,
        package: &UnifiedPackage,
        sink: Option<OutputSink>,
    ) -> Result<(), ManagerError> {
        self.mutate(Mutation::Install, Some(package), sink).await?;
        self.refresh_installed().await;
        Ok(())
    }

    /// Uninstall `package`, then refresh the installed list.
    ///
    /// # Errors
    /// - [`ManagerError::BackendUnavailable`] or [`ManagerError::UninstallFailed`].
    pub async fn uninstall(
        &self,
        package: &UnifiedPackage,
        sink: Option<OutputSink>,
    ) -> Result<(), ManagerError> {
        self.mutate(Mutation::Uninstall, Some(package), sink).await?;
        self.refresh_installed().await;
        Ok(())
    }

    /// Upgrade `package`, then refresh installed and outdated lists.
    ///
    /// # Errors
    /// - [`ManagerError::BackendUnavailable`] or [`ManagerError::UpgradeFailed`].
    pub async fn upgrade(
        &self,
        package: &UnifiedPackage,
        sink: Option<OutputSink>,
    ) -> Result<(), ManagerError> {
        self.mutate(Mutation::Upgrade, Some(package), sink).await?;
        self.refresh_installed().await;
        self.refresh_outdated().await;
        Ok(())
    }

    /// Upgrade everything, then refresh installed and outdated lists.
    ///
    /// # Errors
    /// - [`ManagerError::BackendUnavailable`] or [`ManagerError::UpgradeFailed`].
    pub async fn upgrade_all(&self, sink: Option<OutputSink>) -> Result<(), ManagerError> {
        self.mutate(Mutation::UpgradeAll, None, sink).await?;
        self.refresh_installed().await;
        self.refresh_outdated().await;
        Ok(())
    }

    /// Update backend metadata, then refresh the outdated list.
    ///
    /// # Errors
    /// - [`ManagerError::BackendUnavailable`] or [`ManagerError::UpdateFailed`].
    pub async fn update(&self, sink: Option<OutputSink>) -> Result<(), ManagerError> {
        self.mutate(Mutation::Update, None, sink).await?;
        self.refresh_outdated().await;
        Ok(())
    }

    async fn mutate(
        &self,
        op: Mutation,
        package: Option<&UnifiedPackage>,
        sink: Option<OutputSink>,
    ) -> Result<(), ManagerError> {
        let Some(runner) = self.runner() else {
            warn!(op = op.verb(), "mutation refused: backend unavailable");
            return Err(ManagerError::BackendUnavailable);
        };
        let args = mutation_args(op.verb(), package);
        info!(op = ?op, args = ?args, "running backend mutation");

        let mut flight = InFlight::enter(self, None, |_| {});
        let outcome: Result<_, RunnerError> = match sink {
            Some(sink) => runner.run_streaming(&args, sink).await,
            None => runner.run(&args).await,
        };
        let result = match outcome {
            Ok(r) if r.succeeded() => Ok(()),
            Ok(r) => Err(op.failure(r.diagnostic_text().to_string())),
            Err(e) => Err(op.failure(e.to_string())),
        };
        flight.leave(|s| {
            if let Err(e) = &result {
                s.last_error = Some(e.to_string());
            }
        });
        match &result {
            Ok(()) => info!(op = ?op, "mutation finished"),
            Err(e) => warn!(op = ?op, error = %e, "mutation failed"),
        }
        result
    }

    /// What: Re-run the locator and swap in a runner for whatever it finds.
    ///
    /// Output:
    /// - The new location, or `None` when the backend is still missing.
    pub fn relocate(&self) -> Option<ExecutableLocation> {
        let location = self.locator.locate();
        let backend = Backend::from_location(location.as_ref(), &self.env);
        let (available, path) = (backend.available, backend.display_path());
        *self
            .backend
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = backend;
        info!(available, path = ?path, "backend relocated");
        self.state.send_modify(|s| {
            s.is_backend_available = available;
            s.backend_path = path;
        });
        location
    }

    /// Installation prefix reported by the backend, if it can be queried.
    pub async fn backend_prefix(&self) -> Option<String> {
        let runner = self.runner()?;
        query_prefix(runner.as_ref()).await
    }

    /// Delete all cached list results.
    ///
    /// # Errors
    /// - [`CacheError`] when the cache directory cannot be cleared.
    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.cache.clear_all().await
    }

    /// What: Run the backend install script, then relocate on success.
    ///
    /// Inputs:
    /// - `sink`: Optional live output receiver.
    ///
    /// # Errors
    /// - [`RunnerError`] when the installer shell cannot be started.
    pub async fn install_backend(
        &self,
        sink: Option<OutputSink>,
    ) -> Result<InstallOutcome, RunnerError> {
        let outcome = self.installer.run(sink).await?;
        if outcome.succeeded {
            self.relocate();
        }
        Ok(outcome)
    }
}
