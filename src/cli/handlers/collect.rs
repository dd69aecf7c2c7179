use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::cli::commands::CollectArgs;
use crate::cli::utils::{load_config, open_session, resolve_date_range, TransferProgress};
use crate::collect::{CollectionJob, CollectionReport, LogCache, LogCollector};

pub async fn handle_collect_command(config_path: Option<PathBuf>, args: CollectArgs) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let profile = config.host(args.host.as_deref())?.clone();
    let date_range = resolve_date_range(args.start, args.end, config.date_range)?;

    let job = CollectionJob::new(profile, args.output.clone().unwrap_or_else(|| config.output_dir.clone()))
        .with_date_range(date_range)
        .with_archive_format(args.format.unwrap_or(config.archive_format))
        .with_cache(args.use_cache);
    let cache = LogCache::new(config.cache_dir.clone());

    info!("Starting log collection for host '{}'", job.profile.name);
    let local = args.local;

    // the session and transfers block; keep them off the runtime threads
    let report = tokio::task::spawn_blocking(move || -> Result<CollectionReport> {
        let mut session = open_session(&job.profile, &config, local)?;
        let collector = LogCollector::new(job).with_cache(cache);
        let mut progress = TransferProgress::new();
        let result = collector.run(&mut session, &mut |name, done, total| progress.update(name, done, total));
        progress.finish();
        session.close();
        result.context("Log collection aborted")
    })
    .await
    .context("Collection worker failed")??;

    print_summary(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Collection report written to {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &CollectionReport) {
    println!();
    println!("{}", "Collection summary".bold());
    println!("{}", "─".repeat(40));
    println!("Host:              {}", report.host);
    if let Some(family) = report.os_family {
        println!("Remote system:     {}", family);
    }
    println!("Files downloaded:  {}", report.downloaded.len().to_string().green());
    println!("Skipped by date:   {}", report.skipped_by_date);
    if !report.failed.is_empty() {
        println!("Failed:            {}", report.failed.len().to_string().red());
        for path in &report.failed {
            println!("  • {}", path);
        }
    }
    for path in &report.empty_paths {
        println!("{} no log files under {}", "⚠".yellow(), path);
    }
    println!("Bytes transferred: {}", report.bytes_transferred);

    match &report.archive {
        Some(archive) => println!("{} Logs saved to {}", "✅".green(), archive.display()),
        None => println!("{} No log files matched, nothing was packaged", "⚠".yellow()),
    }
}
