//! File artifacts addressed by paper id.

use std::path::{Path, PathBuf};

use crate::config::DataLayout;
use crate::tts::is_placeholder_artifact;

/// Audio extensions a finished podcast may have.
const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// Reads and writes the per-paper files below the data directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: DataLayout,
}

impl ArtifactStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// `papers/<paper_id>.pdf`
    pub fn pdf_path(&self, paper_id: &str) -> PathBuf {
        self.layout.papers_dir.join(format!("{paper_id}.pdf"))
    }

    /// `interpretations/<paper_id>.md`
    pub fn interpretation_path(&self, paper_id: &str) -> PathBuf {
        self.layout
            .interpretations_dir
            .join(format!("{paper_id}.md"))
    }

    /// Requested synthesis output, `podcasts/<paper_id>.mp3`.  The produced
    /// file may end up with another extension.
    pub fn podcast_output(&self, paper_id: &str) -> PathBuf {
        self.layout.podcasts_dir.join(format!("{paper_id}.mp3"))
    }

    /// Write (or replace) the interpretation of `paper_id`.
    pub async fn write_interpretation(
        &self,
        paper_id: &str,
        content: &str,
    ) -> std::io::Result<PathBuf> {
        let path = self.interpretation_path(paper_id);
        tokio::fs::create_dir_all(&self.layout.interpretations_dir).await?;
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    /// Stored interpretation, or `None` if it was never written.
    pub async fn read_interpretation(&self, paper_id: &str) -> std::io::Result<Option<String>> {
        read_optional(&self.interpretation_path(paper_id)).await
    }

    /// A real (non-placeholder) podcast file of `paper_id`, if one exists.
    pub fn existing_audio(&self, paper_id: &str) -> Option<PathBuf> {
        AUDIO_EXTENSIONS
            .iter()
            .map(|ext| self.layout.podcasts_dir.join(format!("{paper_id}.{ext}")))
            .find(|p| p.is_file() && !is_placeholder_artifact(p))
    }

    /// Remove every file belonging to `paper_id`, including leftover
    /// synthesis parts.  Missing files are ignored.
    pub async fn remove_all(&self, paper_id: &str) -> std::io::Result<()> {
        let mut paths = vec![self.pdf_path(paper_id), self.interpretation_path(paper_id)];
        paths.extend(
            ["mp3", "wav", "txt"]
                .iter()
                .map(|ext| self.layout.podcasts_dir.join(format!("{paper_id}.{ext}"))),
        );
        paths.extend(self.podcast_parts(paper_id).await?);
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::debug!("storage: removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// `podcasts/<paper_id>_part*` files left by an interrupted synthesis.
    async fn podcast_parts(&self, paper_id: &str) -> std::io::Result<Vec<PathBuf>> {
        let prefix = format!("{paper_id}_part");
        let mut entries = match tokio::fs::read_dir(&self.layout.podcasts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                parts.push(entry.path());
            }
        }
        Ok(parts)
    }
}

async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
