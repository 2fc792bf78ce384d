//! Configuration de la réparation des shaders

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Options de réparation, modifiables par l'utilisateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Enregistre chaque tentative de remplacement pour le diagnostic
    pub shader_debugging: bool,

    /// Télécharge les nouvelles archives au démarrage
    pub download_new_bundles: bool,

    /// Laisse les shaders non supportés tels quels au lieu du shader invalide
    pub show_unsupported_shaders: bool,

    /// Rendu multi-passes actif: aucune réparation n'est nécessaire
    pub enable_multi_pass_rendering: bool,

    /// Affiche un avis quand des shaders restent sans remplacement
    pub show_unresolved_notice: bool,

    /// Répertoire des archives locales
    pub bundle_directory: PathBuf,

    /// Attente maximale des archives téléchargées, en millisecondes
    pub web_bundle_timeout_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            shader_debugging: true,
            download_new_bundles: true,
            show_unsupported_shaders: false,
            enable_multi_pass_rendering: false,
            show_unresolved_notice: true,
            bundle_directory: PathBuf::from("./ShaderBundles"),
            web_bundle_timeout_ms: 30_000,
        }
    }
}

impl RepairConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RepairConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn web_bundle_timeout(&self) -> Duration {
        Duration::from_millis(self.web_bundle_timeout_ms)
    }

    /// Enveloppe partageable, lue à chaque réparation
    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}

/// Configuration partagée entre l'interface et le coordinateur
pub type SharedConfig = Arc<RwLock<RepairConfig>>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RepairConfig::default();
        assert!(config.shader_debugging);
        assert!(config.download_new_bundles);
        assert!(!config.show_unsupported_shaders);
        assert!(!config.enable_multi_pass_rendering);
        assert_eq!(config.web_bundle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("repair.toml");

        let config = RepairConfig {
            show_unsupported_shaders: true,
            bundle_directory: PathBuf::from("/games/bundles"),
            ..RepairConfig::default()
        };
        config.save_to_file(&path)?;

        assert_eq!(RepairConfig::load_from_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("repair.toml");
        fs::write(&path, "enable_multi_pass_rendering = true\n")?;

        let config = RepairConfig::load_from_file(&path)?;
        assert!(config.enable_multi_pass_rendering);
        assert!(config.shader_debugging);
        assert_eq!(config.bundle_directory, PathBuf::from("./ShaderBundles"));
        Ok(())
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = RepairConfig::load_or_default("/nonexistent/repair.toml");
        assert_eq!(config, RepairConfig::default());
    }

    #[test]
    fn test_shared_config_updates() {
        let shared = RepairConfig::default().shared();
        shared.write().show_unsupported_shaders = true;
        assert!(shared.read().show_unsupported_shaders);
    }
}
