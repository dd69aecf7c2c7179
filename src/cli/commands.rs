use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::collect::ArchiveFormat;

#[derive(Parser, Debug)]
#[command(
    name = "wclog",
    about = "Collect, package and search logs from remote hosts over SSH",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for logs
    #[arg(long, default_value = "text", global = true)]
    pub log_format: String,

    /// Host profile file (default: $WCLOG_CONFIG or ./config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect logs from a host into a single archive
    Collect(CollectArgs),

    /// Search local log files, directories and archives for a keyword
    Search {
        /// Literal text to look for
        #[arg(short, long)]
        keyword: String,

        /// Files, directories or .zip/.tar.gz bundles to search
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Match regardless of case
        #[arg(short, long)]
        ignore_case: bool,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a host's logs through the cache and search them
    RemoteSearch {
        /// Host profile name (optional when only one is configured)
        #[arg(long)]
        host: Option<String>,

        /// Literal text to look for
        #[arg(short, long)]
        keyword: String,

        /// Match regardless of case
        #[arg(short, long)]
        ignore_case: bool,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read from the local filesystem instead of over SSH
        #[arg(long)]
        local: bool,
    },

    /// Manage the local download cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// List configured host profiles
    Hosts,

    /// Test SSH connectivity and log path listing for a host
    TestSsh {
        /// Host profile name (optional when only one is configured)
        #[arg(long)]
        host: Option<String>,
    },

    /// Show information about wclog
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Host profile name (optional when only one is configured)
    #[arg(long)]
    pub host: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Directory the archive is written to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Archive format: zip or tar.gz
    #[arg(long)]
    pub format: Option<ArchiveFormat>,

    /// Reuse files already in the local cache
    #[arg(long)]
    pub use_cache: bool,

    /// Read from the local filesystem instead of over SSH
    #[arg(long)]
    pub local: bool,

    /// Also write the collection summary as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete the whole cache directory
    Clear,

    /// Print the cache directory
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collect() {
        let cli = Cli::parse_from([
            "wclog", "collect", "--host", "lane-01", "--start", "2024-01-01", "--end", "2024-01-03",
            "--format", "tar.gz", "--use-cache",
        ]);
        let Commands::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.host.as_deref(), Some("lane-01"));
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(args.format, Some(ArchiveFormat::TarGz));
        assert!(args.use_cache);
        assert!(!args.local);
    }

    #[test]
    fn test_parse_search_with_global_flags() {
        let cli = Cli::parse_from(["wclog", "search", "-k", "ERROR", "a.log", "logs/", "-i", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Search { keyword, paths, ignore_case, output } => {
                assert_eq!(keyword, "ERROR");
                assert_eq!(paths.len(), 2);
                assert!(ignore_case);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_paths() {
        assert!(Cli::try_parse_from(["wclog", "search", "-k", "ERROR"]).is_err());
    }
}
