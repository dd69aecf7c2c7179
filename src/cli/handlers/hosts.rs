use anyhow::Result;
use std::path::PathBuf;

use crate::cli::utils::load_config;

pub fn handle_hosts_command(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;

    println!("🔧 Configured hosts");
    println!("═══════════════════════════════════════");

    if config.hosts.is_empty() {
        println!("No host profiles configured");
        return Ok(());
    }

    for host in &config.hosts {
        println!();
        println!("• {} ({}@{}:{})", host.name, host.username, host.host, host.port);
        println!(
            "  Password: {}",
            if host.password.is_empty() { "not set" } else { "********" }
        );
        for path in &host.log_paths {
            println!("  - {}", path);
        }
    }

    println!();
    match &config.date_range {
        Some(range) => println!("Date range: {}", range),
        None => println!("Date range: disabled (today)"),
    }
    println!("Output directory: {}", config.output_dir.display());
    println!("Archive format: {}", config.archive_format.extension());
    println!("Cache directory: {}", config.cache_dir.display());

    Ok(())
}
