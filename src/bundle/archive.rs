//! Lecture des archives `.shaderbundle`
//!
//! Une archive est un zip contenant exactement deux entrées utiles: le
//! manifeste JSON et la charge utile du bundle natif.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::shader::{parse_manifest, ShaderEntry};

/// Extension des archives de shaders
pub const BUNDLE_EXTENSION: &str = "shaderbundle";

/// Nom de l'entrée manifeste dans l'archive
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Nom de l'entrée contenant le bundle natif
pub const BUNDLE_FILE_NAME: &str = "shaders.bundle";

/// Erreurs de lecture d'une archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("erreur d'E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive zip invalide: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("manifeste JSON invalide: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entrée {entry} absente de l'archive")]
    MissingEntry { entry: &'static str },

    #[error("erreur de parcours: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Contenu extrait d'une archive
#[derive(Debug)]
pub struct ArchiveContents {
    /// Chemin de l'archive
    pub path: PathBuf,

    /// Shaders décrits par le manifeste
    pub shaders: BTreeMap<String, Arc<ShaderEntry>>,

    /// Charge utile du bundle natif
    pub payload: Vec<u8>,
}

/// Lit le manifeste et la charge utile d'une archive
pub fn read_archive(path: &Path) -> Result<ArchiveContents, ArchiveError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let manifest_index = find_entry(&mut archive, MANIFEST_FILE_NAME)?
        .ok_or(ArchiveError::MissingEntry { entry: MANIFEST_FILE_NAME })?;
    let bundle_index = find_entry(&mut archive, BUNDLE_FILE_NAME)?
        .ok_or(ArchiveError::MissingEntry { entry: BUNDLE_FILE_NAME })?;

    let mut manifest_json = String::new();
    archive.by_index(manifest_index)?.read_to_string(&mut manifest_json)?;
    let shaders = parse_manifest(&manifest_json)?;

    let mut payload = Vec::new();
    archive.by_index(bundle_index)?.read_to_end(&mut payload)?;

    Ok(ArchiveContents {
        path: path.to_path_buf(),
        shaders,
        payload,
    })
}

/// Cherche une entrée par nom de fichier, quel que soit son dossier dans l'archive
fn find_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    file_name: &str,
) -> Result<Option<usize>, ArchiveError> {
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().rsplit('/').next().unwrap_or_default();
        if name == file_name {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Liste les archives d'un répertoire, triées par chemin
pub fn find_archives(directory: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archives = Vec::new();

    for entry in WalkDir::new(directory).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_bundle_archive(path) {
            archives.push(path.to_path_buf());
        }
    }

    archives.sort();
    Ok(archives)
}

pub fn is_bundle_archive(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(BUNDLE_EXTENSION))
        .unwrap_or(false)
}

/// Génère un rapport sur les archives d'un répertoire, sans runtime natif
pub fn generate_directory_report(directory: &Path) -> Result<String, ArchiveError> {
    let mut report = String::new();
    report.push_str("=== RAPPORT DES SHADERBUNDLES ===\n\n");

    let archives = find_archives(directory)?;
    report.push_str(&format!("Archives trouvées: {}\n\n", archives.len()));

    for path in &archives {
        match read_archive(path) {
            Ok(contents) => {
                report.push_str(&format!(
                    "{} ({} shaders, {} octets)\n",
                    path.display(),
                    contents.shaders.len(),
                    contents.payload.len()
                ));
                for entry in contents.shaders.values() {
                    report.push_str(&format!(
                        "  {} [{} propriétés] <- {}\n",
                        entry.name(),
                        entry.properties().len(),
                        entry.asset_path()
                    ));
                }
            }
            Err(e) => {
                report.push_str(&format!("{}\n  ❌ Inutilisable: {}\n", path.display(), e));
            }
        }
        report.push('\n');
    }

    Ok(report)
}
