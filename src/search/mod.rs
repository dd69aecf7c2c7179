pub mod archive;
pub mod blocks;
pub mod decode;
pub mod engine;
pub mod remote;

pub use archive::{load_sources, read_archive};
pub use blocks::{source_tag, LogBlock};
pub use engine::{search_sources, SearchOptions, SearchReport, SourceText};
pub use remote::search_remote;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors raised while reading search inputs.
///
/// Decoding never fails, so there is no decode variant. Per-file errors are
/// logged and skipped by `load_sources`.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),
}
