use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::utils::write_output;
use crate::search::{load_sources, search_sources, SearchOptions};

pub async fn handle_search_command(
    paths: Vec<PathBuf>,
    keyword: String,
    ignore_case: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    if keyword.is_empty() {
        bail!("Search keyword must not be empty");
    }

    let options = SearchOptions::new(keyword).ignore_case(ignore_case);
    let report = tokio::task::spawn_blocking(move || {
        let sources = load_sources(&paths);
        info!("Loaded {} log sources", sources.len());
        (sources.is_empty(), search_sources(&sources, &options))
    })
    .await
    .context("Search worker failed")?;

    let (no_sources, report) = report;
    if no_sources {
        bail!("No readable log files found in the given paths");
    }

    if report.is_empty() {
        println!("No matches found");
        return Ok(());
    }

    info!(
        "{} matching blocks in {} files, {} blocks shown",
        report.match_count,
        report.files_searched,
        report.blocks.len()
    );
    write_output(&report.render(), output.as_deref())
}
