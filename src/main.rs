use anyhow::Result;
use clap::Parser;
use wclog::cli::commands::{Cli, Commands};
use wclog::cli::handlers::{
    handle_cache_command, handle_collect_command, handle_hosts_command, handle_remote_search_command,
    handle_search_command, handle_ssh_test_command, RemoteSearchArgs,
};
use wclog::cli::utils::{init_logging, print_info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, &cli.log_format);

    // Execute command
    match cli.command {
        Commands::Collect(args) => handle_collect_command(cli.config, args).await,

        Commands::Search {
            keyword,
            paths,
            ignore_case,
            output,
        } => handle_search_command(paths, keyword, ignore_case, output).await,

        Commands::RemoteSearch {
            host,
            keyword,
            ignore_case,
            start,
            end,
            output,
            local,
        } => {
            let args = RemoteSearchArgs {
                host,
                keyword,
                ignore_case,
                start,
                end,
                output,
                local,
            };
            handle_remote_search_command(cli.config, args).await
        }

        Commands::Cache { action } => handle_cache_command(cli.config, action),

        Commands::Hosts => handle_hosts_command(cli.config),

        Commands::TestSsh { host } => handle_ssh_test_command(cli.config, host).await,

        Commands::Info => {
            print_info();
            Ok(())
        }
    }
}
