//! Shader Repair Rust - Réparation des shaders pour le rendu stéréo instancié
//!
//! Cette bibliothèque détecte les shaders compilés qui ne supportent pas le
//! rendu stéréo "single-pass instanced", puis les remplace par des shaders
//! compatibles issus d'archives `.shaderbundle`.

pub mod bytecode;
pub mod shader;
pub mod matching;
pub mod bundle;
pub mod repair;
pub mod diagnostics;
pub mod config;

pub use bytecode::*;
pub use shader::*;
pub use matching::*;
pub use bundle::*;
pub use repair::*;
pub use diagnostics::*;
pub use config::*;

/// Version de la bibliothèque
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nom du shader "invalide" utilisé pour signaler visuellement un shader non supporté
pub const INVALID_SHADER_NAME: &str = "Hidden/ShaderRepair/Invalid";

/// Mot-clé activé par le moteur en mode stéréo instancié
pub const SINGLE_PASS_KEYWORD: &str = "STEREO_INSTANCING_ON";

/// Sémantique d'entrée dont la présence indique le support du rendu instancié
pub const TEX_ARRAY_SEMANTIC: &str = "SV_RenderTargetArrayIndex";
