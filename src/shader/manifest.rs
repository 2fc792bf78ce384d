//! Manifeste d'un bundle de shaders

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ShaderEntry, ShaderProperty};

/// Description d'un shader dans le fichier manifeste
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShaderDescriptor {
    #[serde(alias = "Name")]
    name: String,

    #[serde(alias = "Properties", default)]
    properties: Vec<ShaderProperty>,

    #[serde(alias = "Keywords", default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedManifest {
    #[serde(rename = "shadersByBundlePath", alias = "ShadersByBundlePath")]
    shaders: BTreeMap<String, ShaderDescriptor>,
}

/// Deux formes acceptées: l'objet enveloppé ou directement la table chemin -> shader
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawManifest {
    Wrapped(WrappedManifest),
    Flat(BTreeMap<String, ShaderDescriptor>),
}

/// Analyse le JSON d'un manifeste en entrées de shaders, indexées par chemin d'asset
pub fn parse_manifest(json: &str) -> Result<BTreeMap<String, Arc<ShaderEntry>>, serde_json::Error> {
    let shaders = match serde_json::from_str::<RawManifest>(json)? {
        RawManifest::Wrapped(wrapped) => wrapped.shaders,
        RawManifest::Flat(flat) => flat,
    };

    Ok(shaders
        .into_iter()
        .map(|(asset_path, descriptor)| {
            let entry = ShaderEntry::new(
                asset_path.clone(),
                descriptor.name,
                descriptor.properties,
                descriptor.keywords,
            );
            (asset_path, Arc::new(entry))
        })
        .collect())
}

/// Manifeste d'une archive chargée et handle de son bundle natif
pub struct ShaderBundleManifest<B> {
    /// Chemin de l'archive source
    path: PathBuf,

    /// Bundle natif, lié une fois la charge utile chargée
    bundle: Option<B>,

    /// Shaders par chemin d'asset dans le bundle
    shaders: BTreeMap<String, Arc<ShaderEntry>>,
}

impl<B> ShaderBundleManifest<B> {
    /// Crée un manifeste sans bundle natif lié
    pub fn new<P: AsRef<Path>>(path: P, shaders: BTreeMap<String, Arc<ShaderEntry>>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            bundle: None,
            shaders,
        }
    }

    pub fn from_json<P: AsRef<Path>>(path: P, json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(path, parse_manifest(json)?))
    }

    /// Lie le bundle natif chargé depuis la charge utile de l'archive
    pub fn bind_bundle(&mut self, bundle: B) {
        self.bundle = Some(bundle);
    }

    pub fn bundle(&self) -> Option<&B> {
        self.bundle.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shaders dans l'ordre des chemins d'asset
    pub fn shaders(&self) -> impl Iterator<Item = &Arc<ShaderEntry>> {
        self.shaders.values()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn entry(&self, asset_path: &str) -> Option<&Arc<ShaderEntry>> {
        self.shaders.get(asset_path)
    }

    /// Premier shader "invalide" du manifeste
    pub fn invalid_marker(&self) -> Option<&Arc<ShaderEntry>> {
        self.shaders().find(|entry| entry.is_invalid_marker())
    }
}

impl<B> fmt::Debug for ShaderBundleManifest<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderBundleManifest")
            .field("path", &self.path)
            .field("bound", &self.bundle.is_some())
            .field("shaders", &self.shaders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderPropertyType;
    use crate::INVALID_SHADER_NAME;

    #[test]
    fn test_parse_flat_manifest() {
        let json = r#"{
            "assets/shaders/foo.shader": {
                "name": "Custom/Foo",
                "properties": [
                    { "name": "_Color", "displayName": "Color", "propertyType": 0 },
                    { "name": "_MainTex", "displayName": "Texture", "propertyType": "Texture" }
                ]
            },
            "assets/shaders/bar.shader": { "name": "Custom/Bar" }
        }"#;

        let shaders = parse_manifest(json).unwrap();
        assert_eq!(shaders.len(), 2);

        let foo = &shaders["assets/shaders/foo.shader"];
        assert_eq!(foo.name(), "Custom/Foo");
        assert_eq!(foo.asset_path(), "assets/shaders/foo.shader");
        assert_eq!(foo.properties().len(), 2);
        assert_eq!(foo.properties()[1].property_type, ShaderPropertyType::Texture);
        assert!(!foo.is_materialized());

        assert!(shaders["assets/shaders/bar.shader"].properties().is_empty());
    }

    #[test]
    fn test_parse_wrapped_pascal_case_manifest() {
        let json = r#"{
            "ShadersByBundlePath": {
                "assets/invalid.shader": {
                    "Name": "Hidden/ShaderRepair/Invalid",
                    "Properties": [
                        { "Name": "_Glow", "DisplayName": "Glow", "PropertyType": 2 }
                    ]
                }
            }
        }"#;

        let manifest = ShaderBundleManifest::<()>::from_json("a.shaderbundle", json).unwrap();
        assert_eq!(manifest.shader_count(), 1);
        assert!(manifest.bundle().is_none());

        let invalid = manifest.invalid_marker().unwrap();
        assert_eq!(invalid.name(), INVALID_SHADER_NAME);
        assert_eq!(invalid.properties()[0].display_name, "Glow");
    }

    #[test]
    fn test_parse_malformed_manifest() {
        assert!(parse_manifest("not json").is_err());
        assert!(parse_manifest(r#"{ "a": { "properties": [] } }"#).is_err());
        assert!(parse_manifest(r#"["a", "b"]"#).is_err());
    }

    #[test]
    fn test_bind_bundle() {
        let mut manifest = ShaderBundleManifest::new("a.shaderbundle", BTreeMap::new());
        manifest.bind_bundle(42u32);
        assert_eq!(manifest.bundle(), Some(&42));
    }
}
