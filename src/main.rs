//! tabvault CLI - inspect and manage a local-first client store
//!
//! Works on the same SQLite store and key layout the client library uses.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tabvault::config::{default_config_path, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tabvault={}", log_level).parse()?)
                .add_directive(format!("tv={}", log_level).parse()?),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Get { key } => cli::commands::get(&config, &key)?,
        Commands::Set {
            key,
            value,
            compress,
        } => cli::commands::set(&config, &key, &value, compress)?,
        Commands::Remove { key } => cli::commands::remove(&config, &key)?,
        Commands::Usage => cli::commands::usage(&config)?,
        Commands::Export { output } => cli::commands::export(&config, output)?,
        Commands::Import { file } => cli::commands::import(&config, &file)?,
        Commands::Clear { yes } => cli::commands::clear(&config, yes)?,
        Commands::Config => cli::commands::show_config(&config, &config_path)?,
    }

    Ok(())
}
