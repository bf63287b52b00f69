#![cfg(unix)]
// End-to-end flow against a fake backend script run as a real process.
// - Writes a POSIX shell script that answers the commands the coordinator issues.
// - Keeps a single test in this binary so no other thread forks while the
//   freshly written script is still open.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use brewdeck::backend::OutputStream;
use brewdeck::cache::{CacheKey, ResultCache};
use brewdeck::config::settings::parse_settings;
use brewdeck::coordinator::{Coordinator, ManagerError};
use brewdeck::model::{PackageKind, UnifiedPackage};
use brewdeck::state::{FetchKind, FetchPhase};

const FAKE_BREW: &str = r#"#!/bin/sh
case "$1" in
  --prefix) echo "/fake/prefix" ;;
  list) echo '{"formulae":[{"name":"wget","installed":[{"version":"1.21","installed_on_request":true,"installed_as_dependency":false}]}],"casks":[]}' ;;
  outdated) echo '{"formulae":[],"casks":[]}' ;;
  tap) echo '[{"name":"homebrew/core","official":true}]' ;;
  install)
    if [ "$2" = "nosuch" ]; then echo "Error: no such package" >&2; exit 1; fi
    echo "==> Installing $2"
    echo "auto-update=$HOMEBREW_NO_AUTO_UPDATE" >&2
    ;;
  *) echo "unexpected: $*" >&2; exit 1 ;;
esac
"#;

fn write_script(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("brew");
    std::fs::write(&path, FAKE_BREW).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

#[tokio::test]
/// What: Drive every coordinator flow through a real child process.
///
/// Inputs:
/// - Fake backend script, settings enabling `no_auto_update`, temp cache root.
///
/// Output:
/// - Installed list holds `wget`; failing install carries the exact stderr;
///   successful install streams both pipes with the env override applied;
///   prefix and taps resolve.
async fn coordinator_drives_fake_backend_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path());
    let settings = parse_settings(&format!(
        "brew_path = {}\ncache_dir = {}\nno_auto_update = yes\n",
        script.display(),
        dir.path().join("cache").display()
    ));
    let coordinator = Coordinator::new(settings.coordinator_options());
    assert!(coordinator.is_backend_available());

    coordinator.refresh_installed().await;
    let snap = coordinator.snapshot();
    assert_eq!(snap.last_error, None);
    assert_eq!(snap.installed_packages.len(), 1);
    assert_eq!(snap.installed_packages[0].identity, "wget");
    assert!(snap.installed_packages[0].is_installed);
    assert!(!snap.installed_packages[0].is_outdated);

    let reopened = ResultCache::new(dir.path().join("cache"));
    let cached: Option<Vec<UnifiedPackage>> = reopened
        .load(CacheKey::InstalledFormulae, None)
        .await
        .expect("load");
    assert_eq!(cached.map(|v| v.len()), Some(1));

    let err = coordinator
        .install(&UnifiedPackage::named("nosuch", PackageKind::Formula), None)
        .await
        .expect_err("install must fail");
    assert_eq!(err, ManagerError::InstallFailed("Error: no such package".to_string()));
    assert_eq!(coordinator.snapshot().installed_packages, snap.installed_packages);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    coordinator
        .install(&UnifiedPackage::named("jq", PackageKind::Formula), Some(tx))
        .await
        .expect("install jq");
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    assert!(
        lines
            .iter()
            .any(|l| l.stream == OutputStream::Stdout && l.text == "==> Installing jq")
    );
    assert!(
        lines
            .iter()
            .any(|l| l.stream == OutputStream::Stderr && l.text == "auto-update=1")
    );

    assert_eq!(coordinator.backend_prefix().await.as_deref(), Some("/fake/prefix"));

    coordinator.refresh_taps().await;
    let snap = coordinator.snapshot();
    assert_eq!(snap.phase(FetchKind::Taps), FetchPhase::Ready);
    assert_eq!(snap.taps[0].user, "homebrew");
    assert_eq!(snap.taps[0].official, Some(true));
}
