//! Archives de shaders et dépôt des bundles chargés

pub mod archive;
pub mod downloader;
pub mod repository;
pub mod runtime;
pub mod testing;

pub use archive::{find_archives, generate_directory_report, read_archive, ArchiveContents, ArchiveError};
pub use downloader::{BundleDownloader, NoDownloader};
pub use repository::{BundleRepository, Replacement, RepositoryError, RepositoryState, DEFAULT_WEB_BUNDLE_TIMEOUT};
pub use runtime::{MainThread, ShaderRuntime};
