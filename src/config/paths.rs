//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\paper-axon\
//!   macOS:   ~/Library/Application Support/paper-axon/
//!   Linux:   ~/.config/paper-axon/
//!
//! Data dir (papers, interpretations, podcasts, database):
//!   Windows: %LOCALAPPDATA%\paper-axon\
//!   macOS:   ~/Library/Application Support/paper-axon/
//!   Linux:   ~/.local/share/paper-axon/
//!
//! The data dir can be moved with `DATA_DIR` or `data.data_dir` in
//! `settings.toml`; [`DataLayout`] resolves everything below it.

use std::path::{Path, PathBuf};

/// Holds the resolved configuration paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default data directory when none is configured.
    pub default_data_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "paper-axon";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let default_data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            default_data_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk artifact layout below the data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
    /// Uploaded and downloaded PDFs.
    pub papers_dir: PathBuf,
    /// `<paper_id>.md` interpretation files.
    pub interpretations_dir: PathBuf,
    /// Podcast audio (or `.txt` placeholders).
    pub podcasts_dir: PathBuf,
    /// SQLite database file.
    pub db_file: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            papers_dir: root.join("papers"),
            interpretations_dir: root.join("interpretations"),
            podcasts_dir: root.join("podcasts"),
            db_file: root.join("paper_axon.db"),
            root,
        }
    }

    /// Create the data directory and every artifact sub-directory.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.root,
            &self.papers_dir,
            &self.interpretations_dir,
            &self.podcasts_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
