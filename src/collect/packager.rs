use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::types::{ArchiveFormat, DateRange};
use super::{CollectError, CollectResult};

/// Prefix of every produced bundle
pub const ARCHIVE_PREFIX: &str = "wcLog";

/// Date used to name the bundle: the range end (which is also the single day
/// when start equals end), or today without a range.
pub fn effective_log_date(range: Option<&DateRange>, today: NaiveDate) -> NaiveDate {
    match range {
        Some(range) => range.end(),
        None => today,
    }
}

/// `wcLog_YYYY-MM-DD.<ext>`
pub fn archive_file_name(log_date: NaiveDate, format: ArchiveFormat) -> String {
    format!("{}_{}.{}", ARCHIVE_PREFIX, log_date.format("%Y-%m-%d"), format.extension())
}

/// Files under `dir`, sorted, with their archive entry names
fn collect_entries(dir: &Path) -> CollectResult<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CollectError::Packaging(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| CollectError::Packaging(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name));
    }
    Ok(entries)
}

/// Bundle everything under `work_dir` into `target`, then delete `work_dir`.
///
/// A lone file that already has the target's archive extension is copied
/// as-is instead of being compressed again.
pub fn package_logs(work_dir: &Path, target: &Path, format: ArchiveFormat) -> CollectResult<PathBuf> {
    let entries = collect_entries(work_dir)?;
    if entries.is_empty() {
        return Err(CollectError::Packaging(format!(
            "no files to package in {}",
            work_dir.display()
        )));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if entries.len() == 1 && format.matches(&entries[0].1) {
        info!("Only one {} file was downloaded, copying it without recompression", format.extension());
        fs::copy(&entries[0].0, target)?;
    } else {
        let written = match format {
            ArchiveFormat::Zip => write_zip(&entries, target),
            ArchiveFormat::TarGz => write_tar_gz(&entries, target),
        };
        if let Err(e) = written {
            if target.exists() {
                if let Err(cleanup) = fs::remove_file(target) {
                    warn!("Could not remove incomplete archive {}: {}", target.display(), cleanup);
                }
            }
            return Err(CollectError::Packaging(e.to_string()));
        }
        debug!("Packed {} files into {}", entries.len(), target.display());
    }

    if let Err(e) = fs::remove_dir_all(work_dir) {
        warn!("Could not remove working directory {}: {}", work_dir.display(), e);
    } else {
        info!("Removed working directory {}", work_dir.display());
    }

    info!("Logs saved to {}", target.display());
    Ok(target.to_path_buf())
}

fn write_zip(entries: &[(PathBuf, String)], target: &Path) -> anyhow::Result<()> {
    let mut zip = ZipWriter::new(File::create(target)?);
    for (path, name) in entries {
        let large = fs::metadata(path)?.len() >= u32::MAX as u64;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(large);
        zip.start_file(name.as_str(), options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

fn write_tar_gz(entries: &[(PathBuf, String)], target: &Path) -> anyhow::Result<()> {
    let encoder = GzEncoder::new(File::create(target)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, name) in entries {
        builder.append_path_with_name(path, name)?;
    }
    builder.into_inner()?.finish()?;
    Ok(())
}
