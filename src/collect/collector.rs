use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cache::LogCache;
use super::date_filter::is_in_range;
use super::lister::collect_candidates;
use super::packager::{archive_file_name, effective_log_date, package_logs};
use super::transfer::download;
use super::types::{CollectionJob, CollectionReport, FileDescriptor, HostProfile};
use super::{CollectError, CollectResult};
use crate::remote::RemoteSession;

/// Open an SSH session for a host profile. Failure is fatal to the job.
pub fn connect_profile(profile: &HostProfile, timeout: Duration) -> CollectResult<RemoteSession> {
    RemoteSession::connect_with_timeout(
        &profile.host,
        profile.port,
        &profile.username,
        &profile.password,
        timeout,
    )
    .map_err(|e| {
        error!("SSH connection to {} failed: {}", profile.host, e);
        CollectError::Connection(e)
    })
}

/// Drives one collection job: list, filter, download, package.
pub struct LogCollector {
    job: CollectionJob,
    cache: Option<LogCache>,
}

impl LogCollector {
    pub fn new(job: CollectionJob) -> Self {
        Self { job, cache: None }
    }

    /// Cache reused across runs when the job has `use_cache` set
    pub fn with_cache(mut self, cache: LogCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the job over an open session.
    ///
    /// Paths that cannot be listed and files that cannot be downloaded are
    /// logged and skipped. A closed or lost connection ends the job with
    /// `CollectError::Connection` and removes the working directory; a
    /// packaging failure ends it with `CollectError::Packaging`. Returns a
    /// report whose `archive` is `None` when nothing matched.
    pub fn run(
        &self,
        session: &mut RemoteSession,
        on_progress: &mut dyn FnMut(&str, u64, u64),
    ) -> CollectResult<CollectionReport> {
        let job = &self.job;
        session.ensure_connected().map_err(CollectError::Connection)?;

        let mut report = CollectionReport {
            host: job.profile.host.clone(),
            ..Default::default()
        };

        if let Some(range) = &job.date_range {
            info!("Using date range: {}", range);
        }
        let log_date = effective_log_date(job.date_range.as_ref(), Local::now().date_naive());
        let target = job.output_dir.join(archive_file_name(log_date, job.archive_format));

        let work_dir = job.output_dir.join(Local::now().format("%Y%m%d_%H%M%S").to_string());
        let work_dir = if work_dir.exists() {
            PathBuf::from(format!(
                "{}_{}",
                work_dir.display(),
                &uuid::Uuid::new_v4().simple().to_string()[..8]
            ))
        } else {
            work_dir
        };
        fs::create_dir_all(&work_dir)?;

        if let Err(e) = self.collect_into(session, &work_dir, &mut report, on_progress) {
            error!("Collection from {} aborted: {}", job.profile.host, e);
            remove_work_dir(&work_dir);
            return Err(e);
        }

        if report.downloaded.is_empty() {
            warn!("No log files matched the filters");
            remove_work_dir(&work_dir);
            return Ok(report);
        }

        report.archive = Some(package_logs(&work_dir, &target, job.archive_format)?);
        Ok(report)
    }

    fn collect_into(
        &self,
        session: &mut RemoteSession,
        work_dir: &Path,
        report: &mut CollectionReport,
        on_progress: &mut dyn FnMut(&str, u64, u64),
    ) -> CollectResult<()> {
        let job = &self.job;
        let family = session.detect_os_family();
        session.ensure_connected().map_err(CollectError::Connection)?;
        report.os_family = Some(family);

        // remote path -> local copy, so a path listed twice is fetched once
        let mut fetched: HashMap<String, PathBuf> = HashMap::new();

        for (index, log_path) in job.profile.log_paths.iter().enumerate() {
            let remote_dir = log_path.trim();
            if remote_dir.is_empty() {
                continue;
            }
            info!("Processing path: {}", remote_dir);

            let candidates = collect_candidates(session, remote_dir, family)?;
            if candidates.is_empty() {
                report.empty_paths.push(remote_dir.to_string());
                continue;
            }

            for file in candidates {
                if let Some(range) = &job.date_range {
                    let in_range = is_in_range(session, &file, range);
                    // a failed mtime lookup must not pass for "out of range"
                    session.ensure_connected().map_err(CollectError::Connection)?;
                    if !in_range {
                        info!("Skipping file outside date range: {}", file.name);
                        report.skipped_by_date += 1;
                        continue;
                    }
                    info!("Found file in date range: {}", file.name);
                }

                let local_path = match local_target(work_dir, index, &file.name) {
                    Ok(path) => path,
                    Err(e) => {
                        error!("Cannot prepare local path for {}: {}", file.name, e);
                        report.failed.push(file.remote_path.clone());
                        continue;
                    }
                };

                if let Some(earlier) = fetched.get(&file.remote_path) {
                    debug!("{} already fetched in this job, copying {}", file.remote_path, earlier.display());
                    match fs::copy(earlier, &local_path) {
                        Ok(_) => report.downloaded.push(file.remote_path.clone()),
                        Err(e) => {
                            error!("Cannot copy {}: {}", earlier.display(), e);
                            report.failed.push(file.remote_path.clone());
                        }
                    }
                    continue;
                }

                match self.fetch_file(session, &file, &local_path, on_progress) {
                    Ok(bytes) => {
                        report.bytes_transferred += bytes;
                        report.downloaded.push(file.remote_path.clone());
                        fetched.insert(file.remote_path.clone(), local_path);
                    }
                    Err(e) if e.is_connection_lost() => return Err(e),
                    Err(e) => {
                        error!("Failed to download {}: {}", file.remote_path, e);
                        report.failed.push(file.remote_path.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Fetch one file into `local_path`. Returns the bytes that crossed the
    /// network, which is zero for a cache hit.
    fn fetch_file(
        &self,
        session: &mut RemoteSession,
        file: &FileDescriptor,
        local_path: &Path,
        on_progress: &mut dyn FnMut(&str, u64, u64),
    ) -> CollectResult<u64> {
        info!("Downloading {}", file.remote_path);
        let mut progress = |transferred: u64, total: u64| on_progress(&file.name, transferred, total);

        match (&self.cache, self.job.use_cache) {
            (Some(cache), true) => {
                let hit = cache.contains(&file.remote_path);
                let cached = cache.get_cached(session, &file.remote_path, &mut progress)?;
                let bytes = fs::copy(cached, local_path)?;
                Ok(if hit { 0 } else { bytes })
            }
            _ => download(session, &file.remote_path, local_path, &mut progress),
        }
    }
}

fn remove_work_dir(work_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(work_dir) {
        warn!("Could not remove working directory {}: {}", work_dir.display(), e);
    }
}

/// Local destination for a file from the `index`-th configured path.
/// A name already taken by an earlier path goes into `dir_<index>/`.
fn local_target(work_dir: &Path, index: usize, name: &str) -> std::io::Result<PathBuf> {
    let direct = work_dir.join(name);
    if !direct.exists() {
        return Ok(direct);
    }
    let sub = work_dir.join(format!("dir_{}", index + 1));
    fs::create_dir_all(&sub)?;
    Ok(sub.join(name))
}
