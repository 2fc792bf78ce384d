//! Construction d'images mémoire synthétiques de shaders natifs
//!
//! Utilisé par les tests et les benchmarks pour reproduire la structure
//! mémoire décrite par [`AbiLayout`] sans runtime natif.

use super::layout::AbiLayout;
use super::view::ForeignView;

/// Adresse de base par défaut des images synthétiques
pub const DEFAULT_BASE: u64 = 0x7f00_0000_0000;

/// Blob de bytecode d'un sous-programme
#[derive(Debug, Clone)]
pub struct BlobSpec {
    pub kind: u8,
    pub magic: [u8; 4],
    pub semantics: Vec<String>,
}

impl BlobSpec {
    pub fn new(kind: u8, semantics: &[&str]) -> Self {
        Self {
            kind,
            magic: *b"DXBC",
            semantics: semantics.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }
}

/// Passe d'un sous-shader; `None` représente un pointeur de programme nul
#[derive(Debug, Clone)]
pub struct PassSpec {
    pub blobs: Option<Vec<BlobSpec>>,
}

impl PassSpec {
    pub fn empty() -> Self {
        Self { blobs: None }
    }

    pub fn with_blobs(blobs: Vec<BlobSpec>) -> Self {
        Self { blobs: Some(blobs) }
    }
}

/// Image mémoire construite
#[derive(Debug, Clone)]
pub struct ShaderImage {
    bytes: Vec<u8>,
    base: u64,
    shader_address: u64,
}

impl ShaderImage {
    pub fn view(&self) -> ForeignView<'_> {
        ForeignView::new(&self.bytes, self.base)
    }

    pub fn shader_address(&self) -> u64 {
        self.shader_address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Constructeur d'images de shaders natifs
#[derive(Debug, Clone)]
pub struct ShaderImageBuilder {
    layout: AbiLayout,
    base: u64,
    sub_shaders: Vec<Vec<PassSpec>>,
}

impl ShaderImageBuilder {
    pub fn new() -> Self {
        Self {
            layout: AbiLayout::default(),
            base: DEFAULT_BASE,
            sub_shaders: Vec::new(),
        }
    }

    pub fn with_layout(mut self, layout: AbiLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    pub fn sub_shader(mut self, passes: Vec<PassSpec>) -> Self {
        self.sub_shaders.push(passes);
        self
    }

    pub fn build(&self) -> ShaderImage {
        let l = &self.layout;
        let ptr = l.pointer_size;
        let mut image = Image {
            bytes: Vec::new(),
            base: self.base,
        };

        let shader = image.alloc(l.shader_internal + ptr);
        let internal = image.alloc(span(l.internal_sub_shader_list + ptr, l.internal_sub_shader_count + 4));
        image.put_u64(shader + l.shader_internal, internal);

        let sub_shader_list = image.alloc(ptr * self.sub_shaders.len() as u64);
        image.put_u64(internal + l.internal_sub_shader_list, sub_shader_list);
        image.put_u32(internal + l.internal_sub_shader_count, self.sub_shaders.len() as u32);

        for (i, passes) in self.sub_shaders.iter().enumerate() {
            let sub_shader = image.alloc(span(l.sub_shader_pass_list + ptr, l.sub_shader_pass_count + 4));
            image.put_u64(sub_shader_list + i as u64 * ptr, sub_shader);
            image.put_u32(sub_shader + l.sub_shader_marker_word, 0);
            image.put_u8(sub_shader + l.sub_shader_marker_byte, 0xFF);

            let pass_list = image.alloc(l.pass_list_stride * passes.len() as u64);
            image.put_u64(sub_shader + l.sub_shader_pass_list, pass_list);
            image.put_u32(sub_shader + l.sub_shader_pass_count, passes.len() as u32);

            for (j, pass_spec) in passes.iter().enumerate() {
                let pass = image.alloc(l.pass_program + ptr);
                image.put_u64(pass_list + j as u64 * l.pass_list_stride, pass);

                let Some(blobs) = &pass_spec.blobs else {
                    continue;
                };

                let program = image.alloc(span(l.program_sub_program_list + ptr, l.program_sub_program_count + 4));
                image.put_u64(pass + l.pass_program, program);

                let sub_program_list = image.alloc(ptr * blobs.len() as u64);
                image.put_u64(program + l.program_sub_program_list, sub_program_list);
                image.put_u32(program + l.program_sub_program_count, blobs.len() as u32);

                for (k, blob_spec) in blobs.iter().enumerate() {
                    let sub_program = image.alloc(l.sub_program_blob + ptr);
                    image.put_u64(sub_program_list + k as u64 * ptr, sub_program);

                    let container = build_container(
                        blob_spec.magic,
                        &[
                            (*b"SHEX", vec![0u8; 16]),
                            (l.container.input_signature_tag, build_input_signature(&blob_spec.semantics)),
                        ],
                    );
                    let container_offset = l
                        .container_offset(blob_spec.kind)
                        .unwrap_or(l.blob_container_default);

                    let blob = image.alloc(container_offset + container.len() as u64);
                    image.put_u64(sub_program + l.sub_program_blob, blob);
                    image.put_u8(blob, blob_spec.kind);
                    image.put_bytes(blob + container_offset, &container);
                }
            }
        }

        ShaderImage {
            bytes: image.bytes,
            base: self.base,
            shader_address: shader,
        }
    }
}

impl Default for ShaderImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Construit un conteneur de bytecode minimal contenant les blocs fournis.
///
/// Le checksum n'est pas calculé (seize zéros).
pub fn build_container(magic: [u8; 4], chunks: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic);
    out.extend_from_slice(&[0u8; 16]); // checksum
    out.extend_from_slice(&1u32.to_le_bytes()); // réservé
    out.extend_from_slice(&0u32.to_le_bytes()); // taille totale, écrite à la fin
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let offsets_pos = out.len();
    out.resize(out.len() + 4 * chunks.len(), 0);

    for (i, (fourcc, data)) in chunks.iter().enumerate() {
        let offset = out.len() as u32;
        out[offsets_pos + 4 * i..offsets_pos + 4 * i + 4].copy_from_slice(&offset.to_le_bytes());

        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    let total_size = out.len() as u32;
    out[24..28].copy_from_slice(&total_size.to_le_bytes());
    out
}

/// Construit la charge utile d'un bloc de signature d'entrée.
///
/// Chaque élément fait 24 octets; l'offset du nom est relatif au début du bloc.
pub fn build_input_signature(semantics: &[String]) -> Vec<u8> {
    const ELEMENT_STRIDE: usize = 24;
    let table_end = 8 + ELEMENT_STRIDE * semantics.len();

    let mut out = Vec::new();
    out.extend_from_slice(&(semantics.len() as u32).to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    let mut name_offset = table_end;
    for (register, name) in semantics.iter().enumerate() {
        out.extend_from_slice(&(name_offset as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // index de sémantique
        out.extend_from_slice(&0u32.to_le_bytes()); // valeur système
        out.extend_from_slice(&3u32.to_le_bytes()); // type de composante (float)
        out.extend_from_slice(&(register as u32).to_le_bytes());
        out.extend_from_slice(&[0x0F, 0x0F, 0, 0]); // masques
        name_offset += name.len() + 1;
    }

    for name in semantics {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }

    out
}

struct Image {
    bytes: Vec<u8>,
    base: u64,
}

impl Image {
    fn alloc(&mut self, size: u64) -> u64 {
        let start = (self.bytes.len() + 7) & !7;
        self.bytes.resize(start + size.max(1) as usize, 0);
        self.base + start as u64
    }

    fn put_bytes(&mut self, address: u64, data: &[u8]) {
        let start = (address - self.base) as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    fn put_u8(&mut self, address: u64, value: u8) {
        self.put_bytes(address, &[value]);
    }

    fn put_u32(&mut self, address: u64, value: u32) {
        self.put_bytes(address, &value.to_le_bytes());
    }

    fn put_u64(&mut self, address: u64, value: u64) {
        self.put_bytes(address, &value.to_le_bytes());
    }
}

fn span(a: u64, b: u64) -> u64 {
    a.max(b)
}
