//! CLI definitions and command implementations for tabvault.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tabvault - inspect and manage a local-first client store
#[derive(Parser)]
#[command(name = "tv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/tabvault/tabvault.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the decoded value of a key
    Get {
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        key: String,

        /// JSON text (plain text is stored as a string)
        value: String,

        /// Compress regardless of size
        #[arg(long)]
        compress: bool,
    },

    /// Remove a key and its compression flag
    Remove {
        key: String,
    },

    /// Show storage usage and the largest keys
    Usage,

    /// Export user data to a JSON file
    Export {
        /// Directory to write the export to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import user data from an export file
    Import {
        file: PathBuf,
    },

    /// Delete every stored key of this application
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the effective configuration
    Config,
}
