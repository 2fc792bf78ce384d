//! Modèles de données des shaders

pub mod manifest;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::bytecode::NativeShaderMemory;
use crate::INVALID_SHADER_NAME;

pub use manifest::{parse_manifest, ShaderBundleManifest};

/// Types de propriétés de shader GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPropertyType")]
pub enum ShaderPropertyType {
    Color,
    Vector,
    Float,
    Range,
    Texture,
    Int,
}

/// Forme brute acceptée dans les manifestes: index numérique ou nom
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPropertyType {
    Index(u32),
    Name(String),
}

impl TryFrom<RawPropertyType> for ShaderPropertyType {
    type Error = String;

    fn try_from(raw: RawPropertyType) -> Result<Self, Self::Error> {
        match raw {
            RawPropertyType::Index(index) => match index {
                0 => Ok(Self::Color),
                1 => Ok(Self::Vector),
                2 => Ok(Self::Float),
                3 => Ok(Self::Range),
                4 => Ok(Self::Texture),
                5 => Ok(Self::Int),
                _ => Err(format!("type de propriété inconnu: {}", index)),
            },
            RawPropertyType::Name(name) => match name.to_ascii_lowercase().as_str() {
                "color" => Ok(Self::Color),
                "vector" => Ok(Self::Vector),
                "float" => Ok(Self::Float),
                "range" => Ok(Self::Range),
                "texture" => Ok(Self::Texture),
                "int" => Ok(Self::Int),
                _ => Err(format!("type de propriété inconnu: {}", name)),
            },
        }
    }
}

/// Propriété déclarée par un shader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderProperty {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "DisplayName", default)]
    pub display_name: String,

    #[serde(alias = "PropertyType")]
    pub property_type: ShaderPropertyType,
}

impl ShaderProperty {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, property_type: ShaderPropertyType) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            property_type,
        }
    }
}

/// Objet shader natif, possédé par le runtime hôte
pub trait ShaderObject: fmt::Debug + Send + Sync {
    /// Nom déclaré du shader
    fn name(&self) -> &str;

    /// Propriétés déclarées, dans l'ordre du shader
    fn properties(&self) -> Vec<ShaderProperty>;

    /// Support du rendu instancié déjà connu, sans inspection du bytecode
    fn known_instancing_support(&self) -> Option<bool> {
        None
    }

    /// Mémoire native du shader, pour l'inspection du bytecode
    fn native_memory(&self) -> Option<NativeShaderMemory<'_>> {
        None
    }
}

/// Référence partagée vers un shader natif
pub type ShaderRef = Arc<dyn ShaderObject>;

/// Compare deux shaders par identité
pub fn same_shader(a: &ShaderRef, b: &ShaderRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Signature d'un shader à remplacer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderSignature {
    pub name: String,
    pub properties: Vec<ShaderProperty>,
    pub keywords: Vec<String>,
}

impl ShaderSignature {
    pub fn new(name: impl Into<String>, properties: Vec<ShaderProperty>, keywords: Vec<String>) -> Self {
        Self {
            name: name.into(),
            properties,
            keywords,
        }
    }

    pub fn from_shader(shader: &dyn ShaderObject, keywords: Vec<String>) -> Self {
        Self::new(shader.name(), shader.properties(), keywords)
    }
}

/// Shader décrit par un manifeste de bundle.
///
/// Le handle natif est absent jusqu'à la matérialisation, puis ne change plus.
pub struct ShaderEntry {
    asset_path: String,
    name: String,
    properties: Vec<ShaderProperty>,
    keywords: Vec<String>,
    native: OnceCell<ShaderRef>,
}

impl ShaderEntry {
    pub fn new(
        asset_path: impl Into<String>,
        name: impl Into<String>,
        properties: Vec<ShaderProperty>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            asset_path: asset_path.into(),
            name: name.into(),
            properties,
            keywords,
            native: OnceCell::new(),
        }
    }

    /// Chemin de l'asset dans le bundle natif
    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[ShaderProperty] {
        &self.properties
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Shader natif, si déjà matérialisé
    pub fn shader(&self) -> Option<&ShaderRef> {
        self.native.get()
    }

    pub fn is_materialized(&self) -> bool {
        self.native.get().is_some()
    }

    /// Vrai pour le shader "invalide" bien connu
    pub fn is_invalid_marker(&self) -> bool {
        self.name == INVALID_SHADER_NAME
    }

    /// Enregistre le shader natif; le premier enregistré est conservé
    pub(crate) fn store_native(&self, shader: ShaderRef) -> ShaderRef {
        match self.native.set(shader.clone()) {
            Ok(()) => shader,
            // Une initialisation asynchrone en cours n'a pas encore de valeur
            Err(_) => self.native.get().cloned().unwrap_or(shader),
        }
    }

    /// Matérialise le shader natif avec `load` si nécessaire.
    ///
    /// Les appels concurrents attendent le chargement en cours au lieu d'en
    /// lancer un second; en cas d'erreur, l'entrée reste vide.
    pub(crate) async fn native_or_try_init<E, F, Fut>(&self, load: F) -> Result<ShaderRef, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ShaderRef, E>>,
    {
        self.native.get_or_try_init(load).await.cloned()
    }
}

impl fmt::Debug for ShaderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderEntry")
            .field("asset_path", &self.asset_path)
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

/// Résultat d'une réparation de shaders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderReplacementInfo {
    /// Tous les shaders de l'objet ont été remplacés (ou n'en avaient pas besoin)
    pub all_shaders_replaced: bool,

    /// Noms des shaders sans remplacement
    pub missing_shader_names: Vec<String>,
}

impl ShaderReplacementInfo {
    pub fn new(missing_shader_names: Vec<String>) -> Self {
        Self {
            all_shaders_replaced: missing_shader_names.is_empty(),
            missing_shader_names,
        }
    }

    /// Aucun remplacement nécessaire
    pub fn all_supported() -> Self {
        Self {
            all_shaders_replaced: true,
            missing_shader_names: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NamedShader(&'static str);

    impl ShaderObject for NamedShader {
        fn name(&self) -> &str {
            self.0
        }

        fn properties(&self) -> Vec<ShaderProperty> {
            Vec::new()
        }
    }

    #[test]
    fn test_property_type_accepts_index_and_name() {
        let by_index: ShaderPropertyType = serde_json::from_str("4").unwrap();
        let by_name: ShaderPropertyType = serde_json::from_str("\"Texture\"").unwrap();
        assert_eq!(by_index, ShaderPropertyType::Texture);
        assert_eq!(by_name, ShaderPropertyType::Texture);
        assert!(serde_json::from_str::<ShaderPropertyType>("9").is_err());
        assert!(serde_json::from_str::<ShaderPropertyType>("\"Cubemap\"").is_err());
    }

    #[test]
    fn test_entry_materializes_once() {
        let entry = ShaderEntry::new("assets/foo.shader", "Foo", Vec::new(), Vec::new());
        assert!(!entry.is_materialized());

        let first: ShaderRef = Arc::new(NamedShader("Foo"));
        let second: ShaderRef = Arc::new(NamedShader("Foo"));

        let stored = entry.store_native(first.clone());
        assert!(same_shader(&stored, &first));

        let stored_again = entry.store_native(second.clone());
        assert!(same_shader(&stored_again, &first));
        assert!(!same_shader(&stored_again, &second));
    }

    #[tokio::test]
    async fn test_concurrent_materialization_loads_once() {
        let entry = ShaderEntry::new("assets/foo.shader", "Foo", Vec::new(), Vec::new());
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<ShaderRef, ()>(Arc::new(NamedShader("Foo")))
        };
        let (first, second) = tokio::join!(entry.native_or_try_init(load), entry.native_or_try_init(load));

        assert!(same_shader(&first.unwrap(), &second.unwrap()));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_materialization_leaves_entry_empty() {
        let entry = ShaderEntry::new("assets/foo.shader", "Foo", Vec::new(), Vec::new());

        let failed = entry.native_or_try_init(|| async { Err::<ShaderRef, _>("absent") }).await;
        assert_eq!(failed.err(), Some("absent"));
        assert!(!entry.is_materialized());
    }

    #[test]
    fn test_invalid_marker() {
        let entry = ShaderEntry::new("a", INVALID_SHADER_NAME, Vec::new(), Vec::new());
        assert!(entry.is_invalid_marker());
        assert!(!ShaderEntry::new("b", "Foo", Vec::new(), Vec::new()).is_invalid_marker());
    }

    #[test]
    fn test_replacement_info() {
        assert!(ShaderReplacementInfo::new(Vec::new()).all_shaders_replaced);

        let info = ShaderReplacementInfo::new(vec!["Bar".to_string()]);
        assert!(!info.all_shaders_replaced);
        assert_eq!(info.missing_shader_names, vec!["Bar"]);
    }
}
