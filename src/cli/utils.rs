use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::collect::{DateRange, HostProfile};
use crate::config::AppConfig;
use crate::remote::{LocalTransport, RemoteSession};

pub fn init_logging(verbose: bool, log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let fmt_layer = if log_format == "json" {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .expect("Failed to initialize tracing subscriber");
}

pub fn print_info() {
    println!("wclog v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
}

/// Date range from `--start`/`--end`, falling back to the configured one.
/// A single given bound selects that one day.
pub fn resolve_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    configured: Option<DateRange>,
) -> Result<Option<DateRange>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end).map_err(anyhow::Error::msg)?)),
        (Some(day), None) | (None, Some(day)) => Ok(Some(DateRange::single(day))),
        (None, None) => Ok(configured),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = AppConfig::resolve_path(path);
    info!("Using config file {}", path.display());
    AppConfig::load(&path)
}

/// Open a session for `profile`, or a local one when `local` is set
pub fn open_session(profile: &HostProfile, config: &AppConfig, local: bool) -> Result<RemoteSession> {
    if local {
        info!("Reading logs from the local filesystem");
        return Ok(RemoteSession::with_transport(Box::new(LocalTransport::new())));
    }
    info!("Connecting to {}@{}:{}", profile.username, profile.host, profile.port);
    let session = crate::collect::connect_profile(profile, config.connect_timeout)?;
    Ok(session)
}

/// Write `text` to `output`, or print it
pub fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

/// One progress bar per file, fed by the transfer progress callback
#[derive(Default)]
pub struct TransferProgress {
    current: Option<(String, ProgressBar)>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, name: &str, transferred: u64, total: u64) {
        let same_file = matches!(&self.current, Some((current, _)) if current == name);
        if !same_file {
            self.finish();
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar.set_message(name.to_string());
            self.current = Some((name.to_string(), bar));
        }

        if let Some((_, bar)) = &self.current {
            bar.set_length(total);
            bar.set_position(transferred);
        }
    }

    pub fn finish(&mut self) {
        if let Some((_, bar)) = self.current.take() {
            bar.finish();
        }
    }
}
