//! Runtime en mémoire et écriture d'archives, pour les tests et benchmarks

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::archive::{BUNDLE_FILE_NAME, MANIFEST_FILE_NAME};
use super::runtime::{MainThread, ShaderRuntime};
use crate::shader::{ShaderObject, ShaderProperty, ShaderRef};

/// Shader natif simulé
#[derive(Debug, Clone)]
pub struct FakeShader {
    pub name: String,
    pub properties: Vec<ShaderProperty>,
    pub instancing: Option<bool>,
}

impl FakeShader {
    /// Shader sans support du rendu instancié
    pub fn legacy(name: impl Into<String>, properties: Vec<ShaderProperty>) -> ShaderRef {
        Arc::new(Self {
            name: name.into(),
            properties,
            instancing: Some(false),
        })
    }

    /// Shader déjà compatible
    pub fn supported(name: impl Into<String>) -> ShaderRef {
        Arc::new(Self {
            name: name.into(),
            properties: Vec::new(),
            instancing: Some(true),
        })
    }
}

impl ShaderObject for FakeShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> Vec<ShaderProperty> {
        self.properties.clone()
    }

    fn known_instancing_support(&self) -> Option<bool> {
        self.instancing
    }
}

/// Bundle simulé: table chemin d'asset -> nom de shader
#[derive(Debug, Clone)]
pub struct FakeBundle {
    pub identity: PathBuf,
    pub assets: HashMap<String, String>,
}

/// Runtime en mémoire.
///
/// La charge utile d'un bundle est une ligne `chemin\tnom` par shader; une
/// charge utile qui n'est pas de l'UTF-8 est refusée.
#[derive(Debug)]
pub struct FakeRuntime {
    main_thread: MainThread,
    bundle_loads: AtomicUsize,
    shader_loads: AtomicUsize,
}

impl FakeRuntime {
    /// Le thread appelant devient le thread principal
    pub fn new() -> Self {
        Self {
            main_thread: MainThread::capture(),
            bundle_loads: AtomicUsize::new(0),
            shader_loads: AtomicUsize::new(0),
        }
    }

    pub fn bundle_loads(&self) -> usize {
        self.bundle_loads.load(Ordering::SeqCst)
    }

    pub fn shader_loads(&self) -> usize {
        self.shader_loads.load(Ordering::SeqCst)
    }

    fn parse_bundle(&self, identity: &Path, payload: &[u8]) -> Option<FakeBundle> {
        let text = std::str::from_utf8(payload).ok()?;
        let assets = text
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .map(|(asset, name)| (asset.to_string(), name.to_string()))
            .collect();

        self.bundle_loads.fetch_add(1, Ordering::SeqCst);
        Some(FakeBundle {
            identity: identity.to_path_buf(),
            assets,
        })
    }

    fn create_shader(&self, bundle: &FakeBundle, asset_path: &str) -> Option<ShaderRef> {
        let name = bundle.assets.get(asset_path)?;
        self.shader_loads.fetch_add(1, Ordering::SeqCst);
        Some(FakeShader::supported(name.clone()))
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderRuntime for FakeRuntime {
    type Bundle = FakeBundle;

    fn is_main_thread(&self) -> bool {
        self.main_thread.is_current()
    }

    fn load_bundle(&self, identity: &Path, payload: &[u8]) -> Option<FakeBundle> {
        self.parse_bundle(identity, payload)
    }

    async fn load_bundle_async(&self, identity: &Path, payload: Vec<u8>) -> Option<FakeBundle> {
        tokio::task::yield_now().await;
        self.parse_bundle(identity, &payload)
    }

    fn load_shader(&self, bundle: &FakeBundle, asset_path: &str) -> Option<ShaderRef> {
        self.create_shader(bundle, asset_path)
    }

    async fn load_shader_async(&self, bundle: &FakeBundle, asset_path: &str) -> Option<ShaderRef> {
        tokio::task::yield_now().await;
        self.create_shader(bundle, asset_path)
    }
}

/// Charge utile comprise par [`FakeRuntime`]
pub fn fake_payload(assets: &[(&str, &str)]) -> Vec<u8> {
    assets
        .iter()
        .map(|(asset, name)| format!("{}\t{}\n", asset, name))
        .collect::<String>()
        .into_bytes()
}

/// Écrit un zip contenant les entrées fournies
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    for (name, data) in entries {
        writer.start_file(*name, zip::write::FileOptions::default())?;
        writer.write_all(data)?;
    }
    writer.finish()?;
    Ok(())
}

/// Écrit une archive complète dont chaque shader est chargeable par [`FakeRuntime`].
///
/// `shaders` contient (chemin d'asset, descripteur JSON).
pub fn write_fake_bundle(path: &Path, shaders: &[(&str, serde_json::Value)]) -> std::io::Result<()> {
    let mut manifest = serde_json::Map::new();
    let mut assets = Vec::new();

    for (asset_path, descriptor) in shaders {
        let name = descriptor
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        assets.push((asset_path.to_string(), name));
        manifest.insert(asset_path.to_string(), descriptor.clone());
    }

    let manifest = serde_json::to_vec(&serde_json::Value::Object(manifest))?;
    let refs: Vec<(&str, &str)> = assets.iter().map(|(a, n)| (a.as_str(), n.as_str())).collect();
    let payload = fake_payload(&refs);

    write_archive(path, &[(MANIFEST_FILE_NAME, &manifest), (BUNDLE_FILE_NAME, &payload)])
}
