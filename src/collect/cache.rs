use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::transfer::download;
use super::CollectResult;
use crate::remote::shell::remote_basename;
use crate::remote::RemoteSession;

/// Local download cache keyed by a hash of the remote path.
///
/// Entries are never refreshed: once a remote path has been downloaded the
/// local copy is reused until the cache is cleared.
#[derive(Debug, Clone)]
pub struct LogCache {
    dir: PathBuf,
}

impl LogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform cache location, e.g. `~/.cache/wclog`
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("wclog")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<md5 of remote path>_<basename>`
    pub fn key_for(remote_path: &str) -> String {
        let digest = md5::compute(remote_path.as_bytes());
        let name: String = remote_basename(remote_path)
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
            .collect();
        format!("{:x}_{}", digest, name)
    }

    pub fn path_for(&self, remote_path: &str) -> PathBuf {
        self.dir.join(Self::key_for(remote_path))
    }

    pub fn contains(&self, remote_path: &str) -> bool {
        self.path_for(remote_path).is_file()
    }

    /// Local copy of `remote_path`, downloading it only on the first request
    pub fn get_cached(
        &self,
        session: &mut RemoteSession,
        remote_path: &str,
        on_progress: &mut dyn FnMut(u64, u64),
    ) -> CollectResult<PathBuf> {
        let cached = self.path_for(remote_path);
        if cached.is_file() {
            debug!("Cache hit for {} -> {}", remote_path, cached.display());
            return Ok(cached);
        }

        fs::create_dir_all(&self.dir)?;
        let partial = cached.with_extension("part");
        download(session, remote_path, &partial, on_progress)?;
        fs::rename(&partial, &cached)?;
        debug!("Cached {} at {}", remote_path, cached.display());
        Ok(cached)
    }

    /// Delete the whole cache directory
    pub fn clear(&self) -> io::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
            info!("Cleared cache at {}", self.dir.display());
        }
        Ok(())
    }
}
