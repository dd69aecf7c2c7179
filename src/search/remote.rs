//! Search on a remote host: download through the cache, then search locally.

use tracing::{info, warn};

use super::archive::load_file_as;
use super::engine::{search_sources, SearchOptions, SearchReport};
use crate::collect::date_filter::is_in_range;
use crate::collect::lister::collect_candidates;
use crate::collect::{CollectError, CollectResult, DateRange, LogCache};
use crate::remote::RemoteSession;

/// Search the log files under `log_paths` on the session's host.
///
/// Files are fetched through `cache`, so a repeated search does not download
/// them again. Listing or transfer problems with one path or file are logged
/// and skipped; a closed or lost connection aborts the search.
pub fn search_remote(
    session: &mut RemoteSession,
    log_paths: &[String],
    date_range: Option<&DateRange>,
    cache: &LogCache,
    options: &SearchOptions,
    on_progress: &mut dyn FnMut(&str, u64, u64),
) -> CollectResult<SearchReport> {
    session.ensure_connected().map_err(CollectError::Connection)?;
    let family = session.detect_os_family();
    let mut sources = Vec::new();

    for log_path in log_paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        for file in collect_candidates(session, log_path, family)? {
            if let Some(range) = date_range {
                let in_range = is_in_range(session, &file, range);
                session.ensure_connected().map_err(CollectError::Connection)?;
                if !in_range {
                    continue;
                }
            }

            let mut progress = |done: u64, total: u64| on_progress(&file.name, done, total);
            let local = match cache.get_cached(session, &file.remote_path, &mut progress) {
                Ok(local) => local,
                Err(e) if e.is_connection_lost() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", file.remote_path, e);
                    continue;
                }
            };

            // keep the remote name so tags are not derived from the cache key
            match load_file_as(&local, &file.name) {
                Ok(loaded) => sources.extend(loaded),
                Err(e) => warn!("Cannot read cached copy of {}: {}", file.remote_path, e),
            }
        }
    }

    info!("Searching {} files from {}", sources.len(), session.endpoint());
    Ok(search_sources(&sources, options))
}
