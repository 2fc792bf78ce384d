//! Objets de scène parcourus par la réparation

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::shader::{same_shader, ShaderRef};

/// Matériau partagé; son shader peut être remplacé en place
#[derive(Debug)]
pub struct Material {
    pub name: String,
    shader: RwLock<Option<ShaderRef>>,
}

pub type MaterialRef = Arc<Material>;

impl Material {
    pub fn new(name: impl Into<String>, shader: Option<ShaderRef>) -> MaterialRef {
        Arc::new(Self {
            name: name.into(),
            shader: RwLock::new(shader),
        })
    }

    pub fn shader(&self) -> Option<ShaderRef> {
        self.shader.read().clone()
    }

    pub fn set_shader(&self, shader: ShaderRef) {
        *self.shader.write() = Some(shader);
    }

    pub fn uses_shader(&self, shader: &ShaderRef) -> bool {
        self.shader.read().as_ref().map(|s| same_shader(s, shader)).unwrap_or(false)
    }
}

/// Renderer et ses emplacements de matériaux (éventuellement vides)
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    pub shared_materials: Vec<Option<MaterialRef>>,
}

impl Renderer {
    pub fn new(shared_materials: Vec<Option<MaterialRef>>) -> Self {
        Self { shared_materials }
    }
}

/// Noeud de la hiérarchie d'un objet chargé
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub active: bool,
    pub renderers: Vec<Renderer>,
    pub children: Vec<SceneObject>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            renderers: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_child(mut self, child: SceneObject) -> Self {
        self.children.push(child);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Matériaux distincts utilisés par l'objet et ses descendants, actifs ou non.
///
/// Les emplacements vides et les matériaux sans shader sont ignorés.
pub fn materials_from_object(object: &SceneObject) -> Vec<MaterialRef> {
    let mut seen = HashSet::new();
    let mut materials = Vec::new();
    collect_materials(object, &mut seen, &mut materials);
    materials
}

fn collect_materials(object: &SceneObject, seen: &mut HashSet<*const Material>, out: &mut Vec<MaterialRef>) {
    for renderer in &object.renderers {
        for material in renderer.shared_materials.iter().flatten() {
            if material.shader().is_none() {
                continue;
            }
            if seen.insert(Arc::as_ptr(material)) {
                out.push(material.clone());
            }
        }
    }

    for child in &object.children {
        collect_materials(child, seen, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::testing::FakeShader;

    #[test]
    fn test_materials_from_hierarchy() {
        let shader = FakeShader::legacy("Foo", Vec::new());
        let shared = Material::new("shared", Some(shader.clone()));
        let hidden = Material::new("hidden", Some(shader.clone()));
        let empty = Material::new("empty", None);

        let object = SceneObject::new("root")
            .with_renderer(Renderer::new(vec![Some(shared.clone()), None, Some(empty)]))
            .with_child(
                SceneObject::new("child")
                    .inactive()
                    .with_renderer(Renderer::new(vec![Some(shared.clone()), Some(hidden.clone())])),
            );

        let materials = materials_from_object(&object);
        assert_eq!(materials.len(), 2);
        assert!(Arc::ptr_eq(&materials[0], &shared));
        assert!(Arc::ptr_eq(&materials[1], &hidden));
    }

    #[test]
    fn test_set_shader() {
        let old = FakeShader::legacy("Old", Vec::new());
        let new = FakeShader::supported("New");
        let material = Material::new("m", Some(old.clone()));
        assert!(material.uses_shader(&old));

        material.set_shader(new.clone());
        assert!(material.uses_shader(&new));
        assert!(!material.uses_shader(&old));
    }
}
