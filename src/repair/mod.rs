//! Réparation des shaders d'un objet chargé
//!
//! Pour chaque shader distinct utilisé par les matériaux, on vérifie s'il
//! supporte déjà le rendu instancié; sinon on cherche un remplacement dans
//! les bundles chargés et on l'applique à tous les matériaux concernés.

pub mod notice;
pub mod scene;


use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::bundle::{BundleDownloader, BundleRepository, Replacement, RepositoryError, ShaderRuntime};
use crate::bytecode::BytecodeInspector;
use crate::config::{RepairConfig, SharedConfig};
use crate::diagnostics::{ShaderDebugInfo, ShaderDebugger};
use crate::shader::{same_shader, ShaderRef, ShaderReplacementInfo, ShaderSignature};
use crate::SINGLE_PASS_KEYWORD;

pub use notice::{notice_channel, NoticeDispatcher, NoticeReceiver, PendingNotice, UnresolvedShaderNotice};
pub use scene::{materials_from_object, Material, MaterialRef, Renderer, SceneObject};

/// Erreurs de réparation; toutes signalent une erreur d'intégration de l'appelant
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("la réparation doit être lancée depuis le thread principal")]
    NotMainThread,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Mots-clés des requêtes.
// TODO: extraire les mots-clés actifs du bytecode au lieu de cette liste fixe
fn query_keywords() -> Vec<String> {
    vec![SINGLE_PASS_KEYWORD.to_string()]
}

/// Coordinateur de la réparation
pub struct ShaderRepair<R: ShaderRuntime> {
    repository: Arc<BundleRepository<R>>,
    inspector: BytecodeInspector,
    config: SharedConfig,
    notices: Option<NoticeDispatcher>,
    debugger: Arc<ShaderDebugger>,
}

impl<R: ShaderRuntime> ShaderRepair<R> {
    pub fn new(repository: Arc<BundleRepository<R>>, config: SharedConfig) -> Self {
        Self {
            repository,
            inspector: BytecodeInspector::default(),
            config,
            notices: None,
            debugger: Arc::new(ShaderDebugger::new()),
        }
    }

    pub fn with_inspector(mut self, inspector: BytecodeInspector) -> Self {
        self.inspector = inspector;
        self
    }

    /// Branche l'avis "shaders non résolus"
    pub fn with_notices(mut self, dispatcher: NoticeDispatcher) -> Self {
        self.notices = Some(dispatcher);
        self
    }

    pub fn repository(&self) -> &Arc<BundleRepository<R>> {
        &self.repository
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn debugger(&self) -> &Arc<ShaderDebugger> {
        &self.debugger
    }

    /// Charge les archives du répertoire configuré
    pub fn load_local_bundles(&self) -> Result<usize, RepairError> {
        let directory = self.bundle_directory();
        Ok(self.repository.load_all_local_bundles(&directory)?)
    }

    /// Lance la phase web, ou la termine immédiatement si le téléchargement est désactivé
    pub async fn load_web_bundles<D: BundleDownloader>(&self, downloader: &D) -> Result<usize, RepairError> {
        if !self.config.read().download_new_bundles {
            info!("Téléchargement des shaderbundles désactivé");
            self.repository.mark_web_bundles_loaded();
            return Ok(0);
        }

        let directory = self.bundle_directory();
        Ok(self.repository.load_web_bundles_async(downloader, &directory).await?)
    }

    pub fn fix_shaders_on_object(&self, object: &SceneObject) -> Result<ShaderReplacementInfo, RepairError> {
        self.fix_shaders_on_materials(&materials_from_object(object))
    }

    pub fn fix_shader_on_material(&self, material: &MaterialRef) -> Result<ShaderReplacementInfo, RepairError> {
        self.fix_shaders_on_materials(std::slice::from_ref(material))
    }

    pub fn fix_shaders_on_materials(&self, materials: &[MaterialRef]) -> Result<ShaderReplacementInfo, RepairError> {
        self.ensure_main_thread()?;
        let config = self.config.read().clone();

        let Some(shaders) = self.shaders_needing_repair(materials, &config) else {
            return Ok(ShaderReplacementInfo::all_supported());
        };

        let mut missing = Vec::new();
        for shader in &shaders {
            let query = ShaderSignature::from_shader(shader.as_ref(), query_keywords());
            let replacement = settle(&query, self.repository.find_replacement(&query))?;
            self.apply(materials, shader, &query, replacement, &config, &mut missing);
        }

        Ok(self.finish(missing, &config))
    }

    pub async fn fix_shaders_on_object_async(&self, object: &SceneObject) -> Result<ShaderReplacementInfo, RepairError> {
        self.fix_shaders_on_materials_async(&materials_from_object(object)).await
    }

    pub async fn fix_shader_on_material_async(
        &self,
        material: &MaterialRef,
    ) -> Result<ShaderReplacementInfo, RepairError> {
        self.fix_shaders_on_materials_async(std::slice::from_ref(material)).await
    }

    /// Variante asynchrone: attend d'abord la fin de la phase web
    pub async fn fix_shaders_on_materials_async(
        &self,
        materials: &[MaterialRef],
    ) -> Result<ShaderReplacementInfo, RepairError> {
        self.ensure_main_thread()?;
        let config = self.config.read().clone();

        let Some(shaders) = self.shaders_needing_repair(materials, &config) else {
            return Ok(ShaderReplacementInfo::all_supported());
        };

        self.repository.await_web_bundles(config.web_bundle_timeout()).await;

        let mut missing = Vec::new();
        for shader in &shaders {
            let query = ShaderSignature::from_shader(shader.as_ref(), query_keywords());
            let replacement = settle(&query, self.repository.find_replacement_async(&query).await)?;
            self.apply(materials, shader, &query, replacement, &config, &mut missing);
        }

        Ok(self.finish(missing, &config))
    }

    /// Vrai si le shader supporte déjà le rendu instancié.
    ///
    /// Lit la mémoire native du shader: réservé au thread principal.
    pub fn is_supported(&self, shader: &ShaderRef) -> Result<bool, RepairError> {
        self.ensure_main_thread()?;
        Ok(self.supports(shader))
    }

    fn supports(&self, shader: &ShaderRef) -> bool {
        shader
            .known_instancing_support()
            .unwrap_or_else(|| self.inspector.supports_instancing(shader.as_ref()))
    }

    /// Shaders distincts à réparer; `None` quand il n'y a rien à faire
    fn shaders_needing_repair(&self, materials: &[MaterialRef], config: &RepairConfig) -> Option<Vec<ShaderRef>> {
        if config.enable_multi_pass_rendering {
            return None;
        }

        let mut shaders: Vec<ShaderRef> = Vec::new();
        for shader in materials.iter().filter_map(|m| m.shader()) {
            if !shaders.iter().any(|s| same_shader(s, &shader)) {
                shaders.push(shader);
            }
        }

        shaders.retain(|shader| !self.supports(shader));
        if shaders.is_empty() {
            None
        } else {
            Some(shaders)
        }
    }

    fn apply(
        &self,
        materials: &[MaterialRef],
        shader: &ShaderRef,
        query: &ShaderSignature,
        replacement: Option<Replacement>,
        config: &RepairConfig,
        missing: &mut Vec<String>,
    ) {
        if config.shader_debugging {
            self.debugger.add(ShaderDebugInfo::new(
                query,
                replacement.as_ref().map(|r| r.entry.name()),
                replacement.as_ref().map(|r| r.matched),
            ));
        }

        let users: Vec<&MaterialRef> = materials.iter().filter(|m| m.uses_shader(shader)).collect();

        match replacement {
            Some(replacement) => {
                info!(
                    "Shader {} remplacé par {} (score {})",
                    query.name,
                    replacement.entry.name(),
                    replacement.matched.score()
                );
                for material in users {
                    material.set_shader(replacement.shader.clone());
                }
            }
            None => {
                warn!("Aucun remplacement trouvé pour le shader {}", query.name);
                if !missing.contains(&query.name) {
                    missing.push(query.name.clone());
                }

                if config.show_unsupported_shaders {
                    return;
                }
                match self.repository.invalid_shader() {
                    Some(invalid) => {
                        for material in users {
                            material.set_shader(invalid.clone());
                        }
                    }
                    None => warn!("Shader invalide indisponible, {} laissé tel quel", query.name),
                }
            }
        }
    }

    fn finish(&self, missing: Vec<String>, config: &RepairConfig) -> ShaderReplacementInfo {
        if !missing.is_empty() && config.show_unresolved_notice && !config.enable_multi_pass_rendering {
            if let Some(notices) = &self.notices {
                notices.dispatch(missing.clone());
            }
        }

        ShaderReplacementInfo::new(missing)
    }

    fn ensure_main_thread(&self) -> Result<(), RepairError> {
        if self.repository.runtime().is_main_thread() {
            Ok(())
        } else {
            Err(RepairError::NotMainThread)
        }
    }

    fn bundle_directory(&self) -> PathBuf {
        self.config.read().bundle_directory.clone()
    }
}

/// Un asset introuvable ne concerne que ce shader: il est traité comme manquant
fn settle(
    query: &ShaderSignature,
    result: Result<Option<Replacement>, RepositoryError>,
) -> Result<Option<Replacement>, RepairError> {
    match result {
        Ok(replacement) => Ok(replacement),
        Err(RepositoryError::AssetNotFound { archive, asset_path }) => {
            error!(
                "Remplacement de {} inutilisable: {} absent de {}",
                query.name,
                asset_path,
                archive.display()
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
