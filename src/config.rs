use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::collect::{ArchiveFormat, DateRange, HostProfile, LogCache};
use crate::remote::session::DEFAULT_TIMEOUT;

pub const CONFIG_ENV: &str = "WCLOG_CONFIG";
pub const OUTPUT_DIR_ENV: &str = "WCLOG_OUTPUT_DIR";
pub const CACHE_DIR_ENV: &str = "WCLOG_CACHE_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "collected_logs";

/// Path shown in freshly generated config files; never a real directory
const PLACEHOLDER_PATH: &str = "/path/to/logs";

/// Profile name given to the single-host layout
const LEGACY_PROFILE: &str = "default";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    hosts: Vec<HostProfile>,
    /// Single-host layout: `ssh:` plus top-level `log_paths`
    ssh: Option<LegacySsh>,
    #[serde(default)]
    log_paths: Vec<String>,
    date_range: Option<DateRangeConfig>,
    output_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    archive_format: ArchiveFormat,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LegacySsh {
    host: String,
    #[serde(default = "legacy_port")]
    port: u16,
    username: String,
    #[serde(default)]
    password: String,
}

fn legacy_port() -> u16 {
    22
}

#[derive(Debug, Default, Deserialize)]
struct DateRangeConfig {
    #[serde(default)]
    enabled: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

/// Loaded and validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hosts: Vec<HostProfile>,
    pub date_range: Option<DateRange>,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub archive_format: ArchiveFormat,
    pub connect_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            date_range: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cache_dir: LogCache::default_dir(),
            archive_format: ArchiveFormat::default(),
            connect_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// `--config` flag, then `WCLOG_CONFIG`, then `config.yaml`
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load `.env`, read the YAML file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let _ = dotenv::dotenv();

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        debug!("Loaded {} host profiles from {}", config.hosts.len(), path.display());
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let _ = dotenv::dotenv();
        debug!("No config file at {}, using defaults", path.display());
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse YAML without touching the environment
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        let mut hosts = file.hosts;
        if let Some(ssh) = file.ssh {
            if hosts.iter().any(|h| h.name == LEGACY_PROFILE) {
                bail!("Host profile name '{}' clashes with the top-level ssh section", LEGACY_PROFILE);
            }
            hosts.push(HostProfile {
                name: LEGACY_PROFILE.to_string(),
                host: ssh.host,
                port: ssh.port,
                username: ssh.username,
                password: ssh.password,
                log_paths: file.log_paths,
            });
        } else if !file.log_paths.is_empty() {
            warn!("Top-level log_paths are ignored without an ssh section");
        }

        for host in &mut hosts {
            host.log_paths = clean_log_paths(&host.log_paths);
        }

        let date_range = match file.date_range {
            Some(range) if range.enabled => {
                let (Some(start), Some(end)) = (range.start_date, range.end_date) else {
                    bail!("date_range is enabled but start_date or end_date is missing");
                };
                Some(DateRange::new(start, end).map_err(anyhow::Error::msg)?)
            }
            _ => None,
        };

        let defaults = Self::default();
        Ok(Self {
            hosts,
            date_range,
            output_dir: file.output_dir.unwrap_or(defaults.output_dir),
            cache_dir: file.cache_dir.unwrap_or(defaults.cache_dir),
            archive_format: file.archive_format,
            connect_timeout: file
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = env::var(CACHE_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.cache_dir = PathBuf::from(dir);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for host in &self.hosts {
            if host.host.trim().is_empty() {
                bail!("Host profile '{}' has no host address", host.name);
            }
            if host.username.trim().is_empty() {
                bail!("Host profile '{}' has no username", host.name);
            }
            if host.log_paths.is_empty() {
                bail!("Host profile '{}' has no log paths", host.name);
            }
        }
        for (i, host) in self.hosts.iter().enumerate() {
            if self.hosts[..i].iter().any(|h| h.name == host.name) {
                bail!("Duplicate host profile name '{}'", host.name);
            }
        }
        Ok(())
    }

    /// Profile by name; without a name the only configured profile
    pub fn host(&self, name: Option<&str>) -> Result<&HostProfile> {
        match name {
            Some(name) => self
                .hosts
                .iter()
                .find(|h| h.name == name)
                .with_context(|| format!("No host profile named '{}'", name)),
            None => match self.hosts.as_slice() {
                [only] => Ok(only),
                [] => bail!("No host profiles configured"),
                many => bail!(
                    "Several host profiles configured, pick one with --host: {}",
                    many.iter().map(|h| h.name.as_str()).collect::<Vec<_>>().join(", ")
                ),
            },
        }
    }
}

fn clean_log_paths(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && *p != PLACEHOLDER_PATH)
        .map(str::to_string)
        .collect()
}
