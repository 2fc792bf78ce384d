//! Téléchargement des archives supplémentaires

use std::future::Future;
use std::path::{Path, PathBuf};

/// Service réseau qui dépose de nouvelles archives dans un répertoire.
///
/// Une erreur est traitée par l'appelant comme une liste vide.
pub trait BundleDownloader: Send + Sync {
    fn download_all_shader_bundles(
        &self,
        target_directory: &Path,
    ) -> impl Future<Output = anyhow::Result<Vec<PathBuf>>> + Send;
}

/// Aucun téléchargement
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDownloader;

impl BundleDownloader for NoDownloader {
    async fn download_all_shader_bundles(&self, _target_directory: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}
