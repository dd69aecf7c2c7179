use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::remote::OsFamily;

/// A named SSH host and the log directories to collect from it
#[derive(Clone, Serialize, Deserialize)]
pub struct HostProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub log_paths: Vec<String>,
}

fn default_port() -> u16 {
    22
}

impl fmt::Debug for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .field("log_paths", &self.log_paths)
            .finish()
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if start > end {
            return Err(format!("start date {} is after end date {}", start, end));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Container format of the produced bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Whether `file_name` already carries this format's extension
    pub fn matches(&self, file_name: &str) -> bool {
        file_name
            .to_lowercase()
            .ends_with(&format!(".{}", self.extension()))
    }
}

impl std::str::FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.gz" | "tgz" | "targz" => Ok(ArchiveFormat::TarGz),
            other => Err(format!("unknown archive format '{}' (expected zip or tar.gz)", other)),
        }
    }
}

/// One collection run against one host
#[derive(Debug, Clone)]
pub struct CollectionJob {
    pub profile: HostProfile,
    pub date_range: Option<DateRange>,
    /// Parent directory; the working directory and the archive are created here
    pub output_dir: PathBuf,
    pub archive_format: ArchiveFormat,
    /// Reuse downloads from earlier runs through the local cache. Within one
    /// job a remote path is always fetched at most once.
    pub use_cache: bool,
}

impl CollectionJob {
    pub fn new(profile: HostProfile, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            date_range: None,
            output_dir: output_dir.into(),
            archive_format: ArchiveFormat::default(),
            use_cache: false,
        }
    }

    pub fn with_date_range(mut self, range: Option<DateRange>) -> Self {
        self.date_range = range;
        self
    }

    pub fn with_archive_format(mut self, format: ArchiveFormat) -> Self {
        self.archive_format = format;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// A remote file candidate produced by the directory lister
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub remote_path: String,
    pub size: Option<u64>,
    /// Modification time as printed by the listing, if any
    pub modified: Option<String>,
    /// Modification time in seconds since the epoch, if known
    pub mtime: Option<u64>,
    /// Directory the file was listed in
    pub directory: String,
    /// False when the configured path was taken as a single file
    pub from_directory: bool,
}

/// Outcome of listing one configured path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Directory(Vec<FileDescriptor>),
    SingleFile(FileDescriptor),
}

impl Listing {
    pub fn into_files(self) -> Vec<FileDescriptor> {
        match self {
            Listing::Directory(files) => files,
            Listing::SingleFile(file) => vec![file],
        }
    }
}

/// Summary of a finished collection job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionReport {
    pub host: String,
    pub os_family: Option<OsFamily>,
    pub archive: Option<PathBuf>,
    pub downloaded: Vec<String>,
    pub skipped_by_date: usize,
    pub failed: Vec<String>,
    pub empty_paths: Vec<String>,
    pub bytes_transferred: u64,
}
