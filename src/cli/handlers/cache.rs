use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::commands::CacheCommand;
use crate::collect::LogCache;
use crate::config::AppConfig;

pub fn handle_cache_command(config_path: Option<PathBuf>, action: CacheCommand) -> Result<()> {
    let config = AppConfig::load_or_default(&AppConfig::resolve_path(config_path.as_deref()))?;
    let cache = LogCache::new(config.cache_dir);

    match action {
        CacheCommand::Clear => {
            cache
                .clear()
                .with_context(|| format!("Failed to clear cache at {}", cache.dir().display()))?;
            println!("✅ Cache cleared: {}", cache.dir().display());
        }
        CacheCommand::Path => println!("{}", cache.dir().display()),
    }
    Ok(())
}
