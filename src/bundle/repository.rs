//! Dépôt des bundles de shaders chargés
//!
//! Le dépôt se remplit en deux phases: les archives locales au démarrage, puis
//! les archives téléchargées en arrière-plan. Les manifestes ne sont jamais
//! retirés; les recherches peuvent avoir lieu pendant le chargement et voient
//! alors un ensemble partiel.

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

use super::archive::{find_archives, read_archive, ArchiveContents};
use super::downloader::BundleDownloader;
use super::runtime::ShaderRuntime;
use crate::matching::{match_shader, BestMatch, ShaderMatch};
use crate::shader::{ShaderBundleManifest, ShaderEntry, ShaderRef, ShaderSignature};

/// Attente maximale par défaut des bundles téléchargés
pub const DEFAULT_WEB_BUNDLE_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Erreurs du dépôt
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("les chargements natifs doivent être faits depuis le thread principal")]
    NotMainThread,

    #[error("le bundle natif de {0} n'a jamais été chargé")]
    BundleNotLoaded(PathBuf),

    #[error("asset {asset_path} introuvable dans {archive}")]
    AssetNotFound { archive: PathBuf, asset_path: String },
}

/// Cycle de vie du dépôt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RepositoryState {
    /// Aucun chargement effectué
    Empty,

    /// Archives locales chargées
    LocallyLoaded,

    /// Archives téléchargées ajoutées
    WebLoaded,

    /// Phase web terminée (ou abandonnée après délai)
    Ready,
}

/// Shader de remplacement trouvé
#[derive(Debug, Clone)]
pub struct Replacement {
    pub entry: Arc<ShaderEntry>,
    pub shader: ShaderRef,
    pub matched: ShaderMatch,
}

type ManifestRef<B> = Arc<ShaderBundleManifest<B>>;

/// Issue du chargement d'une archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveLoad {
    Loaded,
    AlreadyLoaded,
    Skipped,
}

/// Dépôt des manifestes et bundles natifs
pub struct BundleRepository<R: ShaderRuntime> {
    runtime: R,
    manifests: RwLock<Vec<ManifestRef<R::Bundle>>>,
    invalid_shader: OnceLock<ShaderRef>,
    web_bundles_loaded: AtomicBool,
    state: Mutex<RepositoryState>,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl<R: ShaderRuntime> BundleRepository<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            manifests: RwLock::new(Vec::new()),
            invalid_shader: OnceLock::new(),
            web_bundles_loaded: AtomicBool::new(false),
            state: Mutex::new(RepositoryState::Empty),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn state(&self) -> RepositoryState {
        *self.state.lock()
    }

    /// Copie de la liste des manifestes chargés
    pub fn manifests(&self) -> Vec<ManifestRef<R::Bundle>> {
        self.manifests.read().clone()
    }

    pub fn manifest_count(&self) -> usize {
        self.manifests.read().len()
    }

    pub fn shader_count(&self) -> usize {
        self.manifests.read().iter().map(|m| m.shader_count()).sum()
    }

    /// Shader "invalide" utilisé pour signaler les shaders non supportés
    pub fn invalid_shader(&self) -> Option<ShaderRef> {
        self.invalid_shader.get().cloned()
    }

    pub fn web_bundles_loaded(&self) -> bool {
        self.web_bundles_loaded.load(Ordering::Acquire)
    }

    /// Marque la phase web comme terminée sans rien télécharger
    pub fn mark_web_bundles_loaded(&self) {
        self.web_bundles_loaded.store(true, Ordering::Release);
        self.advance(RepositoryState::Ready);
    }

    /// Charge toutes les archives locales d'un répertoire.
    ///
    /// Une archive invalide est ignorée sans interrompre le parcours.
    pub fn load_all_local_bundles(&self, directory: &Path) -> Result<usize, RepositoryError> {
        self.ensure_main_thread()?;
        info!("Chargement des shaderbundles depuis {}...", directory.display());

        if !directory.is_dir() {
            warn!("Le répertoire {} n'existe pas", directory.display());
            self.advance(RepositoryState::LocallyLoaded);
            return Ok(0);
        }

        let archives = find_archives(directory).unwrap_or_else(|e| {
            warn!("Impossible de lister {}: {}", directory.display(), e);
            Vec::new()
        });

        let mut loaded = 0;
        for path in &archives {
            if self.load_archive(path) == ArchiveLoad::Loaded {
                loaded += 1;
            }
        }

        self.cache_invalid_shader();
        self.advance(RepositoryState::LocallyLoaded);

        info!(
            "{} manifestes chargés contenant {} shaders",
            self.manifest_count(),
            self.shader_count()
        );
        Ok(loaded)
    }

    /// Télécharge et ajoute les archives supplémentaires.
    ///
    /// Le drapeau de fin est levé sur tous les chemins de sortie, y compris
    /// quand rien n'a été téléchargé.
    pub async fn load_web_bundles_async<D: BundleDownloader>(
        &self,
        downloader: &D,
        directory: &Path,
    ) -> Result<usize, RepositoryError> {
        let _completion = WebStageCompletion(self);
        self.ensure_main_thread()?;

        let downloaded = match downloader.download_all_shader_bundles(directory).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Téléchargement des shaderbundles échoué: {:#}", e);
                Vec::new()
            }
        };

        if downloaded.is_empty() {
            debug!("Aucun shaderbundle téléchargé");
            return Ok(0);
        }

        let mut loaded = 0;
        for path in &downloaded {
            if self.load_archive_async(path).await == ArchiveLoad::Loaded {
                loaded += 1;
            }
        }

        self.cache_invalid_shader_async().await;
        self.advance(RepositoryState::WebLoaded);

        info!(
            "(Web) {} manifestes chargés contenant {} shaders",
            self.manifest_count(),
            self.shader_count()
        );
        Ok(loaded)
    }

    /// Attend la fin de la phase web, au plus `timeout`.
    ///
    /// Après le délai, la phase est marquée terminée et on continue avec ce
    /// qui a été chargé. Retourne faux si le délai a expiré.
    pub async fn await_web_bundles(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        while !self.web_bundles_loaded() {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!("Délai d'attente des shaderbundles web dépassé ({:?})", timeout);
                self.mark_web_bundles_loaded();
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }

        true
    }

    /// Cherche le meilleur remplacement pour un shader et le matérialise
    pub fn find_replacement(&self, query: &ShaderSignature) -> Result<Option<Replacement>, RepositoryError> {
        self.ensure_main_thread()?;

        let Some((manifest, entry, matched)) = self.closest_match(query) else {
            return Ok(None);
        };

        let shader = self.load_native_shader(&manifest, &entry)?;
        Ok(Some(Replacement { entry, shader, matched }))
    }

    pub async fn find_replacement_async(
        &self,
        query: &ShaderSignature,
    ) -> Result<Option<Replacement>, RepositoryError> {
        self.ensure_main_thread()?;

        let Some((manifest, entry, matched)) = self.closest_match(query) else {
            return Ok(None);
        };

        let shader = self.load_native_shader_async(&manifest, &entry).await?;
        Ok(Some(Replacement { entry, shader, matched }))
    }

    /// Parcourt tous les manifestes: la première correspondance complète est
    /// retenue immédiatement, sinon la meilleure partielle.
    fn closest_match(
        &self,
        query: &ShaderSignature,
    ) -> Option<(ManifestRef<R::Bundle>, Arc<ShaderEntry>, ShaderMatch)> {
        let mut best = BestMatch::new();

        for manifest in self.manifests() {
            for entry in manifest.shaders() {
                let Some(matched) = match_shader(query, entry) else {
                    continue;
                };

                if matched.is_full() {
                    return Some((manifest.clone(), entry.clone(), matched));
                }
                best.offer((manifest.clone(), entry.clone()), matched);
            }
        }

        best.into_inner()
            .map(|((manifest, entry), matched)| (manifest, entry, matched))
    }

    /// Charge le shader natif d'une entrée, une seule fois
    pub fn load_native_shader(
        &self,
        manifest: &ShaderBundleManifest<R::Bundle>,
        entry: &ShaderEntry,
    ) -> Result<ShaderRef, RepositoryError> {
        self.ensure_main_thread()?;
        if let Some(shader) = entry.shader() {
            return Ok(shader.clone());
        }

        let bundle = manifest
            .bundle()
            .ok_or_else(|| RepositoryError::BundleNotLoaded(manifest.path().to_path_buf()))?;

        let shader = self
            .runtime
            .load_shader(bundle, entry.asset_path())
            .ok_or_else(|| asset_not_found(manifest, entry))?;

        debug!("Shader {} matérialisé depuis {}", entry.name(), manifest.path().display());
        Ok(entry.store_native(shader))
    }

    pub async fn load_native_shader_async(
        &self,
        manifest: &ShaderBundleManifest<R::Bundle>,
        entry: &ShaderEntry,
    ) -> Result<ShaderRef, RepositoryError> {
        self.ensure_main_thread()?;

        // Les appels concurrents sur la même entrée attendent le premier chargement
        entry
            .native_or_try_init(|| async {
                let bundle = manifest
                    .bundle()
                    .ok_or_else(|| RepositoryError::BundleNotLoaded(manifest.path().to_path_buf()))?;

                let shader = self
                    .runtime
                    .load_shader_async(bundle, entry.asset_path())
                    .await
                    .ok_or_else(|| asset_not_found(manifest, entry))?;

                debug!("Shader {} matérialisé depuis {}", entry.name(), manifest.path().display());
                Ok(shader)
            })
            .await
    }

    /// Génère un rapport sur les bundles chargés
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== SHADERBUNDLES CHARGÉS ===\n\n");
        report.push_str(&format!("État: {:?}\n", self.state()));
        report.push_str(&format!(
            "Shader invalide: {}\n\n",
            if self.invalid_shader.get().is_some() { "✅ chargé" } else { "❌ absent" }
        ));

        for manifest in self.manifests() {
            let materialized = manifest.shaders().filter(|e| e.is_materialized()).count();
            report.push_str(&format!(
                "{}: {} shaders ({} matérialisés)\n",
                manifest.path().display(),
                manifest.shader_count(),
                materialized
            ));
        }

        report
    }

    fn ensure_main_thread(&self) -> Result<(), RepositoryError> {
        if self.runtime.is_main_thread() {
            Ok(())
        } else {
            Err(RepositoryError::NotMainThread)
        }
    }

    fn advance(&self, next: RepositoryState) {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
        }
    }

    fn is_loaded(&self, path: &Path) -> bool {
        self.manifests.read().iter().any(|m| m.path() == path)
    }

    fn read_contents(path: &Path) -> Option<ArchiveContents> {
        match read_archive(path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                warn!("Archive {} ignorée: {}", path.display(), e);
                None
            }
        }
    }

    fn load_archive(&self, path: &Path) -> ArchiveLoad {
        if self.is_loaded(path) {
            debug!("{} déjà chargé", path.display());
            return ArchiveLoad::AlreadyLoaded;
        }
        let Some(contents) = Self::read_contents(path) else {
            return ArchiveLoad::Skipped;
        };

        let Some(_guard) = self.try_begin_load(path) else {
            warn!("Chargement natif déjà en cours pour {}, archive ignorée", path.display());
            return ArchiveLoad::Skipped;
        };
        if self.is_loaded(path) {
            debug!("{} déjà chargé", path.display());
            return ArchiveLoad::AlreadyLoaded;
        }

        let Some(bundle) = self.runtime.load_bundle(path, &contents.payload) else {
            warn!("Le runtime n'a pas pu charger le bundle de {}", path.display());
            return ArchiveLoad::Skipped;
        };

        self.register(path, contents.shaders, bundle);
        ArchiveLoad::Loaded
    }

    async fn load_archive_async(&self, path: &Path) -> ArchiveLoad {
        if self.is_loaded(path) {
            debug!("{} déjà chargé", path.display());
            return ArchiveLoad::AlreadyLoaded;
        }
        let Some(contents) = Self::read_contents(path) else {
            return ArchiveLoad::Skipped;
        };

        let _guard = self.begin_load(path).await;
        if self.is_loaded(path) {
            debug!("{} déjà chargé", path.display());
            return ArchiveLoad::AlreadyLoaded;
        }

        let ArchiveContents { path, shaders, payload } = contents;
        let Some(bundle) = self.runtime.load_bundle_async(&path, payload).await else {
            warn!("Le runtime n'a pas pu charger le bundle de {}", path.display());
            return ArchiveLoad::Skipped;
        };

        self.register(&path, shaders, bundle);
        ArchiveLoad::Loaded
    }

    fn register(
        &self,
        path: &Path,
        shaders: BTreeMap<String, Arc<ShaderEntry>>,
        bundle: R::Bundle,
    ) {
        let mut manifest = ShaderBundleManifest::new(path, shaders);
        manifest.bind_bundle(bundle);

        debug!("Manifeste {} ajouté ({} shaders)", path.display(), manifest.shader_count());
        self.manifests.write().push(Arc::new(manifest));
    }

    fn try_begin_load(&self, identity: &Path) -> Option<InFlightLoad<'_>> {
        let mut loads = self.in_flight.lock();
        if !loads.insert(identity.to_path_buf()) {
            return None;
        }
        Some(InFlightLoad {
            loads: &self.in_flight,
            identity: identity.to_path_buf(),
        })
    }

    async fn begin_load(&self, identity: &Path) -> InFlightLoad<'_> {
        loop {
            if let Some(guard) = self.try_begin_load(identity) {
                return guard;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Matérialise le premier shader "invalide" trouvé; le premier gagne
    fn cache_invalid_shader(&self) {
        if self.invalid_shader.get().is_some() {
            return;
        }

        for manifest in self.manifests() {
            let Some(entry) = manifest.invalid_marker() else {
                continue;
            };
            match self.load_native_shader(&manifest, entry) {
                Ok(shader) => {
                    let _ = self.invalid_shader.set(shader);
                    info!("Shader invalide chargé depuis {}", manifest.path().display());
                    return;
                }
                Err(e) => error!("Shader invalide inutilisable dans {}: {}", manifest.path().display(), e),
            }
        }
    }

    async fn cache_invalid_shader_async(&self) {
        if self.invalid_shader.get().is_some() {
            return;
        }

        for manifest in self.manifests() {
            let Some(entry) = manifest.invalid_marker() else {
                continue;
            };
            match self.load_native_shader_async(&manifest, entry).await {
                Ok(shader) => {
                    let _ = self.invalid_shader.set(shader);
                    info!("Shader invalide chargé depuis {}", manifest.path().display());
                    return;
                }
                Err(e) => error!("Shader invalide inutilisable dans {}: {}", manifest.path().display(), e),
            }
        }
    }
}

fn asset_not_found<B>(manifest: &ShaderBundleManifest<B>, entry: &ShaderEntry) -> RepositoryError {
    RepositoryError::AssetNotFound {
        archive: manifest.path().to_path_buf(),
        asset_path: entry.asset_path().to_string(),
    }
}

/// Réservation d'une identité d'archive pendant son chargement natif
struct InFlightLoad<'a> {
    loads: &'a Mutex<HashSet<PathBuf>>,
    identity: PathBuf,
}

impl Drop for InFlightLoad<'_> {
    fn drop(&mut self) {
        self.loads.lock().remove(&self.identity);
    }
}

/// Lève le drapeau de fin de la phase web en sortie de portée
struct WebStageCompletion<'a, R: ShaderRuntime>(&'a BundleRepository<R>);

impl<R: ShaderRuntime> Drop for WebStageCompletion<'_, R> {
    fn drop(&mut self) {
        self.0.mark_web_bundles_loaded();
    }
}
