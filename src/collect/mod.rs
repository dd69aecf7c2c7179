pub mod cache;
pub mod collector;
pub mod date_filter;
pub mod lister;
pub mod packager;
pub mod transfer;
pub mod types;

#[cfg(test)]
mod test_collector;

pub use cache::LogCache;
pub use collector::{connect_profile, LogCollector};
pub use types::{
    ArchiveFormat, CollectionJob, CollectionReport, DateRange, FileDescriptor, HostProfile, Listing,
};

use crate::remote::RemoteError;

/// Result type for collection operations
pub type CollectResult<T> = Result<T, CollectError>;

/// Errors that can occur while collecting logs.
///
/// `Connection` (including a connection lost mid-job) and `Packaging` end the
/// job; `Listing` and `Transfer` are logged and skipped by the job driver.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Connection failed: {0}")]
    Connection(#[source] RemoteError),

    #[error("Cannot list {path}: {reason}")]
    Listing { path: String, reason: String },

    #[error("Transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    /// Wrap a remote error, keeping connection loss distinguishable from a
    /// per-path or per-file failure
    pub fn from_remote(path: &str, err: RemoteError) -> Self {
        if err.is_connection_lost() {
            CollectError::Connection(err)
        } else {
            CollectError::Transfer {
                path: path.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Whether the job cannot continue on this session
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, CollectError::Connection(_))
    }
}

/// Extensions picked up by the type filter
pub const SUPPORTED_EXTENSIONS: [&str; 2] = [".log", ".zip"];

/// Whether a file name passes the `.log`/`.zip` type filter
pub fn is_supported_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
