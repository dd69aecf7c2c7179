//! Archive-aware reading of search inputs.

use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::blocks::source_tag;
use super::decode::read_text_file;
use super::engine::SourceText;
use super::{SearchError, SearchResult};

/// Scratch directory removed when dropped, whatever the exit path
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create_in(root: &Path) -> io::Result<Self> {
        let path = root.join(format!("wclog-{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("Could not remove scratch directory {}: {}", self.path.display(), e);
        }
    }
}

fn has_log_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".log")
}

/// Whether `path` names a bundle the reader can open
pub fn is_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".zip") || name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Extract every `.log` entry of a zip or tar.gz bundle and decode it.
/// Keys are the entry names inside the archive.
pub fn read_archive(path: &Path) -> SearchResult<BTreeMap<String, String>> {
    read_archive_in(path, &std::env::temp_dir())
}

/// `read_archive` with the scratch directory created under `scratch_root`
fn read_archive_in(path: &Path, scratch_root: &Path) -> SearchResult<BTreeMap<String, String>> {
    let name = path.to_string_lossy().to_lowercase();
    let scratch = ScratchDir::create_in(scratch_root)?;

    let extracted = if name.ends_with(".zip") {
        extract_zip(path, &scratch.path)?
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(path, &scratch.path)?
    } else {
        return Err(SearchError::UnsupportedArchive(path.display().to_string()));
    };

    let mut contents = BTreeMap::new();
    for (entry_name, local) in extracted {
        contents.insert(entry_name, read_text_file(&local)?);
    }
    debug!("Read {} log entries from {}", contents.len(), path.display());
    Ok(contents)
}

fn extract_zip(path: &Path, scratch: &Path) -> SearchResult<Vec<(String, PathBuf)>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || !has_log_extension(file.name()) {
            continue;
        }
        let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
            warn!("Skipping unsafe entry name {} in {}", file.name(), path.display());
            continue;
        };
        let local = scratch.join(&relative);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut file, &mut File::create(&local)?)?;
        extracted.push((file.name().to_string(), local));
    }
    Ok(extracted)
}

fn extract_tar_gz(path: &Path, scratch: &Path) -> SearchResult<Vec<(String, PathBuf)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path)?));
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let relative = entry.path()?.into_owned();
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !has_log_extension(&entry_name) {
            continue;
        }
        if !entry.unpack_in(scratch)? {
            warn!("Skipping unsafe entry name {} in {}", entry_name, path.display());
            continue;
        }
        extracted.push((entry_name, scratch.join(&relative)));
    }
    Ok(extracted)
}

/// Load one file or bundle, naming plain files `display_name`
pub fn load_file_as(path: &Path, display_name: &str) -> SearchResult<Vec<SourceText>> {
    if is_archive(path) {
        let entries = read_archive(path)?;
        return Ok(entries
            .into_iter()
            .map(|(entry, text)| SourceText {
                name: format!("{}!{}", display_name, entry),
                tag: source_tag(&entry),
                lines: text.lines().map(str::to_string).collect(),
            })
            .collect());
    }
    Ok(vec![SourceText::new(display_name, &read_text_file(path)?)])
}

/// Load search inputs from files, directories and bundles.
///
/// Directories contribute their `.log` files and bundles. A file that cannot be
/// read is logged and skipped.
pub fn load_sources(paths: &[PathBuf]) -> Vec<SourceText> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(Result::ok) {
                let wanted = entry.file_type().is_file()
                    && (has_log_extension(&entry.file_name().to_string_lossy()) || is_archive(entry.path()));
                if wanted {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    let mut sources = Vec::new();
    for file in files {
        let display = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        match load_file_as(&file, &display) {
            Ok(loaded) => sources.extend(loaded),
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    sources
}
