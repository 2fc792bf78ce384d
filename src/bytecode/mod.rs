//! Inspection du bytecode des shaders compilés

pub mod view;
pub mod layout;
pub mod inspector;
pub mod test_utils;

pub use view::{ForeignView, NativeShaderMemory, ViewError};
pub use layout::{AbiLayout, ContainerLayout};
pub use inspector::BytecodeInspector;
