//! Page host - the collaborator that stands in for the browser page.
//!
//! Storage and API code never talk to the user directly. They go through
//! a [`PageHost`] for confirmation prompts, toast-style notices, file
//! downloads and page reloads.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible message (the toast of the web client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything the storage and API layers need from the page.
pub trait PageHost: Send + Sync {
    /// Ask the user to confirm a destructive action.
    fn confirm(&self, prompt: &str) -> bool;

    /// Show a notice to the user.
    fn notify(&self, notice: Notice);

    /// Hand `contents` to the user as a downloadable file.
    fn download(&self, file_name: &str, contents: &str) -> Result<PathBuf>;

    /// Reload the page after state was wiped.
    fn reload(&self);
}

/// Host for the terminal front-end.
pub struct TerminalHost {
    download_dir: PathBuf,
    assume_yes: bool,
}

impl TerminalHost {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            assume_yes: false,
        }
    }

    /// Skip confirmation prompts (answers yes).
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl PageHost for TerminalHost {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Confirmation prompt failed, treating as no: {}", e);
                false
            }
        }
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => {
                info!("{}", notice.message);
                println!("{} {}", "✓".green(), notice.message);
            }
            NoticeLevel::Warning => {
                warn!("{}", notice.message);
                println!("{} {}", "!".yellow(), notice.message.yellow());
            }
            NoticeLevel::Error => {
                error!("{}", notice.message);
                eprintln!("{} {}", "✗".red(), notice.message.red());
            }
        }
    }

    fn download(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.download_dir).with_context(|| {
            format!(
                "Cannot create download directory: {}",
                self.download_dir.display()
            )
        })?;

        let path = self.download_dir.join(file_name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Cannot write download: {}", path.display()))?;
        Ok(path)
    }

    fn reload(&self) {
        // Nothing to re-render in a terminal
        info!("Store cleared");
    }
}

/// Host that records every interaction. Used by tests and headless embedders.
#[derive(Debug, Default)]
pub struct RecordingHost {
    confirm_answer: bool,
    prompts: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
    downloads: Mutex<Vec<(String, String)>>,
    reloads: AtomicUsize,
}

impl RecordingHost {
    /// Host that answers every confirmation with `confirm_answer`.
    pub fn new(confirm_answer: bool) -> Self {
        Self {
            confirm_answer,
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// `(file name, contents)` of every download.
    pub fn downloads(&self) -> Vec<(String, String)> {
        self.downloads.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl PageHost for RecordingHost {
    fn confirm(&self, prompt: &str) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.confirm_answer
    }

    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }

    fn download(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        if let Ok(mut downloads) = self.downloads.lock() {
            downloads.push((file_name.to_string(), contents.to_string()));
        }
        Ok(PathBuf::from(file_name))
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_terminal_download_writes_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let host = TerminalHost::new(temp_dir.path().join("downloads"));

        let path = host.download("export.json", "{}")?;
        assert_eq!(std::fs::read_to_string(&path)?, "{}");
        assert!(path.starts_with(host.download_dir()));
        Ok(())
    }

    #[test]
    fn test_terminal_assume_yes_skips_prompt() {
        let host = TerminalHost::new(PathBuf::from(".")).assume_yes(true);
        assert!(host.confirm("Delete everything?"));
    }

    #[test]
    fn test_recording_host_records() {
        let host = RecordingHost::new(false);
        assert!(!host.confirm("Sure?"));
        host.notify(Notice::warning("full"));
        host.reload();

        assert_eq!(host.prompts(), vec!["Sure?".to_string()]);
        assert_eq!(host.notices(), vec![Notice::warning("full")]);
        assert_eq!(host.reload_count(), 1);
    }
}
