use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::cli::utils::{load_config, open_session, resolve_date_range, write_output, TransferProgress};
use crate::collect::LogCache;
use crate::search::{search_remote, SearchOptions};

pub struct RemoteSearchArgs {
    pub host: Option<String>,
    pub keyword: String,
    pub ignore_case: bool,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub output: Option<PathBuf>,
    pub local: bool,
}

pub async fn handle_remote_search_command(config_path: Option<PathBuf>, args: RemoteSearchArgs) -> Result<()> {
    if args.keyword.is_empty() {
        bail!("Search keyword must not be empty");
    }

    let config = load_config(config_path.as_deref())?;
    let profile = config.host(args.host.as_deref())?.clone();
    let date_range = resolve_date_range(args.start, args.end, config.date_range)?;
    let cache = LogCache::new(config.cache_dir.clone());
    let options = SearchOptions::new(args.keyword.clone()).ignore_case(args.ignore_case);
    let local = args.local;

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut session = open_session(&profile, &config, local)?;
        let mut progress = TransferProgress::new();
        let report = search_remote(
            &mut session,
            &profile.log_paths,
            date_range.as_ref(),
            &cache,
            &options,
            &mut |name, done, total| progress.update(name, done, total),
        );
        progress.finish();
        session.close();
        report.context("Remote search aborted")
    })
    .await
    .context("Search worker failed")??;

    if report.is_empty() {
        println!("No matches found");
        return Ok(());
    }
    write_output(&report.render(), args.output.as_deref())
}
