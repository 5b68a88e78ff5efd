//! Command implementations for the tabvault CLI.
//!
//! Every command opens the SQLite store named in the config and works
//! through the same storage facade the web client uses.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabvault::config::Config;
use tabvault::host::{PageHost, TerminalHost};
use tabvault::storage::{Cleared, SetOutcome, SqliteBackend, Storage};

fn open_storage(config: &Config, host: Arc<dyn PageHost>) -> Result<Storage<SqliteBackend>> {
    let backend = SqliteBackend::open(&config.storage.store_path, config.storage.quota())?;
    Ok(Storage::from_config(backend, host, &config.storage))
}

fn terminal_host(config: &Config) -> Arc<TerminalHost> {
    Arc::new(TerminalHost::new(config.export_dir()))
}

fn format_bytes(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Print the decoded value of a key.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let storage = open_storage(config, terminal_host(config))?;

    match storage.get_value(key) {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", format!("No value stored for '{}'", key).yellow()),
    }
    Ok(())
}

/// Store a value under a key.
pub fn set(config: &Config, key: &str, raw: &str, compress: bool) -> Result<()> {
    let mut storage = open_storage(config, terminal_host(config))?;

    // Anything that is not JSON is stored as a plain string
    let value: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    match storage.set(key, &value, compress) {
        SetOutcome::Stored { compressed } => {
            let note = if compressed { " (compressed)" } else { "" };
            println!("{} Stored '{}'{}", "✓".green(), key.cyan(), note);
            Ok(())
        }
        SetOutcome::QuotaRecovered { evicted } => {
            bail!(
                "Store is full; evicted {} temporary key(s), value was not saved",
                evicted.len()
            )
        }
        SetOutcome::Failed { reason } => bail!("Cannot store '{}': {}", key, reason),
    }
}

/// Remove a key.
pub fn remove(config: &Config, key: &str) -> Result<()> {
    let mut storage = open_storage(config, terminal_host(config))?;
    storage.remove(key);
    println!("{} Removed '{}'", "✓".green(), key.cyan());
    Ok(())
}

/// Show storage usage.
pub fn usage(config: &Config) -> Result<()> {
    let storage = open_storage(config, terminal_host(config))?;
    let summary = storage.usage();

    println!("{}", "Storage usage".cyan().bold());
    println!(
        "  {} in {} key(s)",
        format_bytes(summary.total_bytes).green().bold(),
        summary.key_count
    );
    if let Some(quota) = config.storage.quota() {
        let percent = summary.total_bytes as f64 * 100.0 / quota as f64;
        println!("  {:.1}% of {}", percent, format_bytes(quota));
    }

    if !summary.top_keys.is_empty() {
        println!("\n{}", "Largest keys:".cyan());
        for entry in &summary.top_keys {
            println!("  {:>10}  {}", format_bytes(entry.bytes), entry.key);
        }
    }
    Ok(())
}

/// Export user data.
pub fn export(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let dir = output.unwrap_or_else(|| config.export_dir());
    let host = Arc::new(TerminalHost::new(dir));
    let storage = open_storage(config, host)?;

    let path = storage.export_all()?;
    println!("{} Exported to {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}

/// Import user data.
pub fn import(config: &Config, file: &Path) -> Result<()> {
    let mut storage = open_storage(config, terminal_host(config))?;

    let report = storage
        .import_file(file)
        .with_context(|| format!("Import failed: {}", file.display()))?;

    for key in &report.restored {
        println!("  {} {}", "restored".green(), key);
    }
    for (key, reason) in &report.failed {
        println!("  {} {} ({})", "failed".red(), key, reason);
    }
    if report.restored.is_empty() && report.failed.is_empty() {
        println!("{}", "Nothing to import.".yellow());
    }
    Ok(())
}

/// Delete every key of this application.
pub fn clear(config: &Config, yes: bool) -> Result<()> {
    let host = Arc::new(TerminalHost::new(config.export_dir()).assume_yes(yes));
    let mut storage = open_storage(config, host)?;

    match storage.clear_all() {
        Cleared::Cancelled => println!("{}", "Cancelled.".yellow()),
        Cleared::Removed(n) => println!("{} Removed {} entries", "✓".green(), n),
    }
    Ok(())
}

/// Print the effective configuration.
pub fn show_config(config: &Config, path: &Path) -> Result<()> {
    let status = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("{} {}{}", "Config:".cyan(), path.display(), status.yellow());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
