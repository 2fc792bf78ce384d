//! Table des offsets de la structure mémoire native des shaders
//!
//! Ces valeurs ont été relevées empiriquement sur une révision précise du
//! runtime natif. Elles changent d'une version du moteur à l'autre: toute
//! mise à jour se fait ici, sans toucher à l'algorithme de parcours.

/// Offsets de l'objet shader natif, par révision d'ABI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiLayout {
    /// Révision du runtime natif observée
    pub revision: &'static str,

    /// Taille d'un pointeur natif
    pub pointer_size: u64,

    /// Shader -> pointeur vers le shader interne
    pub shader_internal: u64,

    /// Shader interne -> liste des sous-shaders
    pub internal_sub_shader_list: u64,

    /// Shader interne -> nombre de sous-shaders (i32)
    pub internal_sub_shader_count: u64,

    /// Sous-shader -> mot de contrôle (doit valoir 0)
    pub sub_shader_marker_word: u64,

    /// Sous-shader -> octet de contrôle (doit valoir 0xFF)
    pub sub_shader_marker_byte: u64,

    /// Sous-shader -> liste des passes
    pub sub_shader_pass_list: u64,

    /// Sous-shader -> nombre de passes (i32)
    pub sub_shader_pass_count: u64,

    /// Pas entre deux entrées de la liste des passes (deux pointeurs)
    pub pass_list_stride: u64,

    /// Passe -> programme (peut être nul)
    pub pass_program: u64,

    /// Programme -> liste des sous-programmes
    pub program_sub_program_list: u64,

    /// Programme -> nombre de sous-programmes (i32)
    pub program_sub_program_count: u64,

    /// Sous-programme -> blob de bytecode (peut être nul)
    pub sub_program_blob: u64,

    /// Plus grand type de programme GPU reconnu dans l'octet discriminant
    pub blob_max_kind: u8,

    /// Offset du conteneur dans un blob de type 1
    pub blob_container_kind_one: u64,

    /// Offset du conteneur dans les autres blobs
    pub blob_container_default: u64,

    /// Structure du conteneur de bytecode
    pub container: ContainerLayout,
}

/// Structure du conteneur DXBC et de son bloc de signature d'entrée
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    pub magic: [u8; 4],
    pub chunk_count: u64,
    pub chunk_offsets: u64,
    pub chunk_header_len: u64,
    pub input_signature_tag: [u8; 4],
    pub signature_element_count: u64,
    pub signature_elements: u64,
    pub signature_element_stride: u64,
    pub max_semantic_name_len: usize,
}

impl ContainerLayout {
    pub const DXBC: ContainerLayout = ContainerLayout {
        magic: *b"DXBC",
        chunk_count: 28,
        chunk_offsets: 32,
        chunk_header_len: 8,
        input_signature_tag: *b"ISGN",
        signature_element_count: 0,
        signature_elements: 8,
        signature_element_stride: 24,
        max_semantic_name_len: 256,
    };
}

impl AbiLayout {
    /// Runtime 2021.3 (x86_64)
    pub const UNITY_2021_3: AbiLayout = AbiLayout {
        revision: "2021.3-x64",
        pointer_size: 8,
        shader_internal: 56,
        internal_sub_shader_list: 0,
        internal_sub_shader_count: 16,
        sub_shader_marker_word: 0,
        sub_shader_marker_byte: 4,
        sub_shader_pass_list: 112,
        sub_shader_pass_count: 128,
        pass_list_stride: 16,
        pass_program: 120,
        program_sub_program_list: 8,
        program_sub_program_count: 24,
        sub_program_blob: 16,
        blob_max_kind: 2,
        blob_container_kind_one: 6,
        blob_container_default: 38,
        container: ContainerLayout::DXBC,
    };

    /// Offset du conteneur de bytecode pour un type de blob donné
    pub fn container_offset(&self, kind: u8) -> Option<u64> {
        match kind {
            1 => Some(self.blob_container_kind_one),
            k if k <= self.blob_max_kind => Some(self.blob_container_default),
            _ => None,
        }
    }
}

impl Default for AbiLayout {
    fn default() -> Self {
        Self::UNITY_2021_3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_offset_by_kind() {
        let layout = AbiLayout::default();
        assert_eq!(layout.container_offset(0), Some(38));
        assert_eq!(layout.container_offset(1), Some(6));
        assert_eq!(layout.container_offset(2), Some(38));
        assert_eq!(layout.container_offset(3), None);
        assert_eq!(layout.container_offset(0xFF), None);
    }
}
