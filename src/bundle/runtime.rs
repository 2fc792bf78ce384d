//! Interface avec le runtime natif qui crée les bundles et les shaders

use std::future::Future;
use std::path::Path;
use std::thread::{self, ThreadId};

use crate::shader::ShaderRef;

/// Runtime natif capable de créer des objets GPU.
///
/// Toutes les créations doivent se faire sur le thread principal du runtime.
pub trait ShaderRuntime: Send + Sync {
    /// Bundle natif chargé depuis la charge utile d'une archive
    type Bundle: Send + Sync;

    /// Vrai si l'appelant est sur le thread autorisé à créer des objets natifs
    fn is_main_thread(&self) -> bool;

    /// Charge un bundle natif; `identity` identifie l'archive source
    fn load_bundle(&self, identity: &Path, payload: &[u8]) -> Option<Self::Bundle>;

    fn load_bundle_async(
        &self,
        identity: &Path,
        payload: Vec<u8>,
    ) -> impl Future<Output = Option<Self::Bundle>> + Send;

    /// Charge un shader depuis un bundle natif
    fn load_shader(&self, bundle: &Self::Bundle, asset_path: &str) -> Option<ShaderRef>;

    fn load_shader_async(
        &self,
        bundle: &Self::Bundle,
        asset_path: &str,
    ) -> impl Future<Output = Option<ShaderRef>> + Send;
}

/// Thread principal, capturé au démarrage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainThread {
    id: ThreadId,
}

impl MainThread {
    /// Capture le thread courant comme thread principal
    pub fn capture() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_thread_capture() {
        let main = MainThread::capture();
        assert!(main.is_current());

        let other = thread::spawn(move || main.is_current()).join().unwrap();
        assert!(!other);
    }
}
