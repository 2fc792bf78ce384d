//! Tests d'intégration du dépôt de bundles

use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use shader_repair_rust::bundle::testing::{write_fake_bundle, FakeRuntime};
use shader_repair_rust::*;

/// Téléchargeur qui retourne toujours la même archive déjà présente
struct FixedDownloader {
    archive: PathBuf,
}

impl BundleDownloader for FixedDownloader {
    async fn download_all_shader_bundles(&self, _target_directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Ok(vec![self.archive.clone()])
    }
}

fn foo_archive(directory: &Path) -> Result<PathBuf> {
    let path = directory.join("foo.shaderbundle");
    write_fake_bundle(&path, &[("assets/foo.shader", json!({ "name": "Foo" }))])?;
    Ok(path)
}

#[tokio::test]
async fn test_lifecycle() -> Result<()> {
    let local = TempDir::new()?;
    let web = TempDir::new()?;
    foo_archive(local.path())?;

    let repository = BundleRepository::new(FakeRuntime::new());
    assert_eq!(repository.state(), RepositoryState::Empty);

    repository.load_all_local_bundles(local.path())?;
    assert_eq!(repository.state(), RepositoryState::LocallyLoaded);
    assert!(!repository.web_bundles_loaded());

    let downloader = FixedDownloader {
        archive: {
            let path = web.path().join("bar.shaderbundle");
            write_fake_bundle(&path, &[("assets/bar.shader", json!({ "name": "Bar" }))])?;
            path
        },
    };
    assert_eq!(repository.load_web_bundles_async(&downloader, web.path()).await?, 1);

    assert_eq!(repository.state(), RepositoryState::Ready);
    assert!(repository.web_bundles_loaded());
    assert_eq!(repository.manifest_count(), 2);
    assert!(repository.await_web_bundles(DEFAULT_WEB_BUNDLE_TIMEOUT).await);

    let bar = repository.find_replacement_async(&ShaderSignature::new("Bar", vec![], vec![])).await?;
    assert_eq!(bar.unwrap().matched, ShaderMatch::Full);
    Ok(())
}

/// Deux chargements simultanés de la même archive ne créent qu'un bundle natif
#[tokio::test]
async fn test_concurrent_loads_of_same_archive() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let downloader = FixedDownloader {
        archive: foo_archive(temp_dir.path())?,
    };

    let repository = BundleRepository::new(FakeRuntime::new());
    let (first, second) = tokio::join!(
        repository.load_web_bundles_async(&downloader, temp_dir.path()),
        repository.load_web_bundles_async(&downloader, temp_dir.path()),
    );

    assert_eq!(first? + second?, 1);
    assert_eq!(repository.manifest_count(), 1);
    assert_eq!(repository.runtime().bundle_loads(), 1);
    Ok(())
}

/// Une archive déjà chargée localement n'est pas rechargée par la phase web
#[tokio::test]
async fn test_web_stage_skips_local_archive() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let downloader = FixedDownloader {
        archive: foo_archive(temp_dir.path())?,
    };

    let repository = BundleRepository::new(FakeRuntime::new());
    repository.load_all_local_bundles(temp_dir.path())?;
    assert_eq!(repository.load_web_bundles_async(&downloader, temp_dir.path()).await?, 0);
    assert_eq!(repository.runtime().bundle_loads(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_await_returns_once_web_stage_completes() {
    let repository = BundleRepository::new(FakeRuntime::new());

    let (waited, ()) = tokio::join!(repository.await_web_bundles(Duration::from_secs(30)), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        repository.mark_web_bundles_loaded();
    });

    assert!(waited);
    assert_eq!(repository.state(), RepositoryState::Ready);
}

#[test]
fn test_directory_report_lists_shaders() -> Result<()> {
    let temp_dir = TempDir::new()?;
    foo_archive(temp_dir.path())?;

    let report = generate_directory_report(temp_dir.path())?;
    assert!(report.contains("Archives trouvées: 1"));
    assert!(report.contains("Foo [0 propriétés] <- assets/foo.shader"));
    Ok(())
}
