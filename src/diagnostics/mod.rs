//! Capture des tentatives de remplacement, pour le diagnostic

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::matching::ShaderMatch;
use crate::shader::{ShaderProperty, ShaderSignature};

/// Enregistrement d'une tentative de remplacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderDebugInfo {
    pub shader_name: String,
    pub properties: Vec<ShaderProperty>,
    pub keywords: Vec<String>,
    pub replacement_name: Option<String>,
    #[serde(rename = "match")]
    pub matched: Option<ShaderMatch>,
}

impl ShaderDebugInfo {
    pub fn new(query: &ShaderSignature, replacement_name: Option<&str>, matched: Option<ShaderMatch>) -> Self {
        Self {
            shader_name: query.name.clone(),
            properties: query.properties.clone(),
            keywords: query.keywords.clone(),
            replacement_name: replacement_name.map(str::to_string),
            matched,
        }
    }
}

/// Tampon des enregistrements, un par nom de shader (le plus récent gagne)
#[derive(Debug, Default)]
pub struct ShaderDebugger {
    records: Mutex<BTreeMap<String, ShaderDebugInfo>>,
}

impl ShaderDebugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, info: ShaderDebugInfo) {
        self.records.lock().insert(info.shader_name.clone(), info);
    }

    /// Copie des enregistrements, triés par nom de shader
    pub fn records(&self) -> Vec<ShaderDebugInfo> {
        self.records.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn serialize_to_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }

    /// Écrit les enregistrements en JSON
    pub fn serialize_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.serialize_to_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderPropertyType;
    use tempfile::TempDir;

    fn signature(name: &str) -> ShaderSignature {
        ShaderSignature::new(
            name,
            vec![ShaderProperty::new("_Color", "Color", ShaderPropertyType::Color)],
            vec!["STEREO_INSTANCING_ON".to_string()],
        )
    }

    #[test]
    fn test_latest_record_wins() {
        let debugger = ShaderDebugger::new();
        debugger.add(ShaderDebugInfo::new(&signature("Foo"), None, None));
        debugger.add(ShaderDebugInfo::new(&signature("Foo"), Some("Foo"), Some(ShaderMatch::Full)));
        debugger.add(ShaderDebugInfo::new(&signature("Bar"), None, None));

        let records = debugger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].shader_name, "Bar");
        assert_eq!(records[1].replacement_name.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_serialize_to_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("shaders.json");

        let debugger = ShaderDebugger::new();
        debugger.add(ShaderDebugInfo::new(
            &signature("Glow"),
            Some("Custom/Glow"),
            Some(ShaderMatch::Partial { score: 8 }),
        ));
        debugger.serialize_to(&path)?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value[0]["shaderName"], "Glow");
        assert_eq!(value[0]["match"]["kind"], "partial");
        assert_eq!(value[0]["match"]["score"], 8);
        assert_eq!(value[0]["properties"][0]["propertyType"], "Color");
        Ok(())
    }
}
