//! Détection du support du rendu instancié dans le bytecode des shaders
//!
//! Le shader natif contient, par sous-shader, par passe et par sous-programme,
//! un pointeur vers un blob de bytecode compilé. Chaque blob commence par un
//! octet de type suivi, à un offset dépendant du type, d'un conteneur DXBC.
//! On parcourt les blocs du conteneur et on cherche, dans le bloc de signature
//! d'entrée (`ISGN`), un élément portant la sémantique demandée.

use log::{debug, trace, warn};

use super::layout::AbiLayout;
use super::view::{ForeignView, ViewError};
use crate::shader::ShaderObject;
use crate::TEX_ARRAY_SEMANTIC;

/// Nombre maximal d'entrées accepté dans une liste native (sous-shaders,
/// passes, blocs, éléments). Au-delà, la donnée est considérée corrompue.
const MAX_LIST_LEN: i32 = 4096;

/// Inspecteur de bytecode pour une révision d'ABI donnée
#[derive(Debug, Clone, Default)]
pub struct BytecodeInspector {
    layout: AbiLayout,
}

impl BytecodeInspector {
    pub fn new(layout: AbiLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &AbiLayout {
        &self.layout
    }

    /// Vérifie si le shader supporte le rendu stéréo instancié
    pub fn supports_instancing(&self, shader: &dyn ShaderObject) -> bool {
        self.has_input_signature_semantic(shader, TEX_ARRAY_SEMANTIC)
    }

    /// Vérifie si un programme du shader déclare la sémantique d'entrée donnée.
    ///
    /// Un shader sans mémoire native (placeholder, shader legacy) n'est jamais
    /// considéré comme supporté.
    pub fn has_input_signature_semantic(&self, shader: &dyn ShaderObject, semantic: &str) -> bool {
        match shader.native_memory() {
            Some(memory) => self.has_semantic_at(&memory.view, memory.address, semantic),
            None => {
                debug!("Shader {} sans mémoire native", shader.name());
                false
            }
        }
    }

    /// Même vérification, à partir d'une vue et de l'adresse de l'objet shader
    pub fn has_semantic_at(&self, view: &ForeignView<'_>, shader_address: u64, semantic: &str) -> bool {
        if shader_address == 0 {
            debug!("Pointeur de shader invalide");
            return false;
        }

        let containers = self.bytecode_addresses(view, shader_address);
        if containers.is_empty() {
            debug!("Aucun bytecode trouvé pour le shader {:#x}", shader_address);
            return false;
        }

        containers.into_iter().any(|container| {
            match self.container_has_semantic(view, container, semantic) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Conteneur de bytecode illisible à {:#x}: {}", container, e);
                    false
                }
            }
        })
    }

    /// Liste les adresses des conteneurs de bytecode de tous les sous-programmes.
    ///
    /// Une lecture invalide interrompt le parcours: les adresses déjà trouvées
    /// sont conservées.
    pub fn bytecode_addresses(&self, view: &ForeignView<'_>, shader_address: u64) -> Vec<u64> {
        let mut found = Vec::new();
        if let Err(e) = self.walk_programs(view, shader_address, &mut found) {
            warn!("Parcours du shader {:#x} interrompu: {}", shader_address, e);
        }
        found
    }

    fn walk_programs(
        &self,
        view: &ForeignView<'_>,
        shader_address: u64,
        found: &mut Vec<u64>,
    ) -> Result<(), ViewError> {
        let l = &self.layout;

        let internal = view.read_ptr(at(shader_address, l.shader_internal)?)?;
        let sub_shader_list = view.read_ptr(at(internal, l.internal_sub_shader_list)?)?;
        let sub_shader_count = list_len(view.read_i32(at(internal, l.internal_sub_shader_count)?)?, "sous-shaders");
        trace!("Sous-shaders: {}", sub_shader_count);

        for sub_shader_index in 0..sub_shader_count {
            let sub_shader = view.read_ptr(at(sub_shader_list, sub_shader_index * l.pointer_size)?)?;

            if view.read_i32(at(sub_shader, l.sub_shader_marker_word)?)? != 0
                || view.read_u8(at(sub_shader, l.sub_shader_marker_byte)?)? != 0xFF
            {
                warn!("Contrôle du sous-shader {:#x} échoué (révision {})", sub_shader, l.revision);
                return Ok(());
            }

            let pass_list = view.read_ptr(at(sub_shader, l.sub_shader_pass_list)?)?;
            let pass_count = list_len(view.read_i32(at(sub_shader, l.sub_shader_pass_count)?)?, "passes");
            trace!("Passes: {}", pass_count);

            for pass_index in 0..pass_count {
                let pass = view.read_ptr(at(pass_list, pass_index * l.pass_list_stride)?)?;
                let program = view.read_ptr(at(pass, l.pass_program)?)?;
                if program == 0 {
                    trace!("Aucun programme dans la passe {:#x}", pass);
                    continue;
                }

                let sub_program_list = view.read_ptr(at(program, l.program_sub_program_list)?)?;
                let sub_program_count =
                    list_len(view.read_i32(at(program, l.program_sub_program_count)?)?, "sous-programmes");

                for sub_program_index in 0..sub_program_count {
                    let sub_program = view.read_ptr(at(sub_program_list, sub_program_index * l.pointer_size)?)?;
                    let blob = view.read_ptr(at(sub_program, l.sub_program_blob)?)?;
                    if blob == 0 {
                        trace!("Blob nul dans le sous-programme {:#x}", sub_program);
                        continue;
                    }

                    let kind = view.read_u8(blob)?;
                    let Some(container_offset) = l.container_offset(kind) else {
                        continue;
                    };

                    let container = at(blob, container_offset)?;
                    if view.read_fourcc(container)? != l.container.magic {
                        // Offsets dérivés d'une version précise du moteur: on continue quand même
                        warn!("Pas d'en-tête DXBC pour le blob {:#x} (type {:#x})", blob, kind);
                    }

                    trace!("Bytecode: {:#x}", container);
                    found.push(container);
                }
            }
        }

        Ok(())
    }

    /// Cherche la sémantique dans les blocs `ISGN` d'un conteneur
    pub fn container_has_semantic(
        &self,
        view: &ForeignView<'_>,
        container: u64,
        semantic: &str,
    ) -> Result<bool, ViewError> {
        let c = &self.layout.container;
        let chunk_count = list_len(view.read_i32(at(container, c.chunk_count)?)?, "blocs");

        for chunk_index in 0..chunk_count {
            let chunk_offset = view.read_i32(at(container, c.chunk_offsets + 4 * chunk_index)?)?;
            let chunk = view.offset(container, i64::from(chunk_offset))?;

            if view.read_fourcc(chunk)? != c.input_signature_tag {
                continue;
            }

            let data = at(chunk, c.chunk_header_len)?;
            let element_count = list_len(view.read_i32(at(data, c.signature_element_count)?)?, "éléments");

            for element_index in 0..element_count {
                let element = at(data, c.signature_elements + element_index * c.signature_element_stride)?;
                let name_offset = view.read_i32(element)?;
                let name_address = view.offset(data, i64::from(name_offset))?;

                match view.read_cstr(name_address, c.max_semantic_name_len)? {
                    Some(name) if name == semantic.as_bytes() => return Ok(true),
                    Some(name) => trace!("Sémantique: {}", String::from_utf8_lossy(name)),
                    None => trace!("Nom de sémantique non terminé à {:#x}", name_address),
                }
            }
        }

        Ok(false)
    }
}

fn at(address: u64, offset: u64) -> Result<u64, ViewError> {
    address.checked_add(offset).ok_or(ViewError::AddressOverflow {
        address,
        offset: offset as i64,
    })
}

fn list_len(raw: i32, what: &str) -> u64 {
    if !(0..=MAX_LIST_LEN).contains(&raw) {
        warn!("Nombre de {} invalide: {}", what, raw);
        return 0;
    }
    raw as u64
}
