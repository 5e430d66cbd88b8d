//! Core `Synthesizer` trait and the DashScope implementation.
//!
//! Synthesis never fails from the caller's point of view: when the backend is
//! unavailable the script is written next to the requested output as a
//! `.txt` placeholder and a zero duration is reported.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::TtsConfig;
use crate::tts::text::{split_text, truncate_bytes, SEGMENT_MAX_BYTES, SEGMENT_MAX_CHARS};
use crate::tts::wav::merge_wav;

/// Byte rate used to estimate WAV duration (16 kHz, 16-bit mono).
const WAV_BYTES_PER_SEC: f64 = 32_000.0;
/// Byte rate used to estimate MP3 duration (128 kbit/s).
const MP3_BYTES_PER_SEC: f64 = 16_000.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// What kind of file a synthesis run left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Audio,
    /// The script as plain text, written when synthesis was unavailable.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutput {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub kind: ArtifactKind,
}

impl SynthesisOutput {
    pub fn is_placeholder(&self) -> bool {
        self.kind == ArtifactKind::Placeholder
    }
}

/// `true` if `path` is a text placeholder rather than audio.
pub fn is_placeholder_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Reasons a synthesis attempt degraded to a placeholder.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("no TTS API key configured")]
    MissingApiKey,

    #[error("TTS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TTS endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS response has no audio URL")]
    MissingUrl,

    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to merge WAV parts: {0}")]
    Wav(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Text-to-speech backend.
///
/// `output` is the requested artifact path; implementations may change its
/// extension to match the produced format.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, output: &Path) -> SynthesisOutput;
}

// ---------------------------------------------------------------------------
// DashScopeSynthesizer
// ---------------------------------------------------------------------------

/// Qwen TTS through DashScope's non-streaming multimodal-generation API.
pub struct DashScopeSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl DashScopeSynthesizer {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config: config.clone(),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Synthesize one segment and return the URL of the generated audio.
    async fn request_segment(&self, key: &str, segment: &str) -> Result<String, TtsError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": {
                "text":          segment,
                "voice":         self.config.voice,
                "language_type": self.config.language_type
            }
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TtsError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        json["output"]["audio"]["url"]
            .as_str()
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or(TtsError::MissingUrl)
    }

    async fn try_synthesize(&self, text: &str, output: &Path) -> Result<SynthesisOutput, TtsError> {
        let key = self.api_key().ok_or(TtsError::MissingApiKey)?;

        let mut parts: Vec<PathBuf> = Vec::new();
        let duration = match self.fetch_segments(key, text, output, &mut parts).await {
            Ok(duration) => duration,
            Err(e) => {
                remove_files(&parts).await;
                return Err(e);
            }
        };

        let path = match parts.len() {
            0 => return Err(TtsError::MissingUrl),
            1 => parts.remove(0),
            _ => combine_parts(&parts, output).await,
        };

        Ok(SynthesisOutput {
            path,
            duration_secs: duration,
            kind: ArtifactKind::Audio,
        })
    }

    /// Synthesize every segment of `text`, pushing each written file onto
    /// `parts` as soon as it exists.  Returns the estimated total duration.
    async fn fetch_segments(
        &self,
        key: &str,
        text: &str,
        output: &Path,
        parts: &mut Vec<PathBuf>,
    ) -> Result<f64, TtsError> {
        let segments = split_text(text, SEGMENT_MAX_CHARS);
        let single = segments.len() == 1;
        let mut duration = 0.0;

        for (i, segment) in segments.iter().enumerate() {
            let segment = truncate_bytes(segment.trim(), SEGMENT_MAX_BYTES);
            if segment.is_empty() {
                continue;
            }

            let url = self.request_segment(key, segment).await?;
            let bytes = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;

            let is_wav = url.split('?').next().unwrap_or("").contains(".wav");
            let ext = if is_wav { "wav" } else { "mp3" };
            let part = if single {
                output.with_extension(ext)
            } else {
                part_path(output, i, ext)
            };
            tokio::fs::write(&part, &bytes).await?;

            duration += bytes.len() as f64
                / if is_wav { WAV_BYTES_PER_SEC } else { MP3_BYTES_PER_SEC };
            log::debug!("tts: segment {}/{} → {}", i + 1, segments.len(), part.display());
            parts.push(part);
        }
        Ok(duration)
    }
}

#[async_trait]
impl Synthesizer for DashScopeSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> SynthesisOutput {
        if let Some(parent) = output.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                log::warn!("tts: cannot create {}: {e}", parent.display());
            }
        }

        match self.try_synthesize(text, output).await {
            Ok(out) => {
                log::info!(
                    "tts: wrote {} ({:.1}s)",
                    out.path.display(),
                    out.duration_secs
                );
                out
            }
            Err(e) => {
                log::warn!("tts: synthesis unavailable, writing text placeholder: {e}");
                write_placeholder(text, output).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn part_path(output: &Path, index: usize, ext: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "podcast".into());
    output.with_file_name(format!("{stem}_part{index}.{ext}"))
}

/// Join multi-part output into one file next to `output`.  WAV parts are
/// merged sample-wise; MP3 frames are concatenated.  On failure the last part
/// is kept.
async fn combine_parts(parts: &[PathBuf], output: &Path) -> PathBuf {
    let all_wav = parts
        .iter()
        .all(|p| p.extension().is_some_and(|e| e == "wav"));
    let all_mp3 = parts
        .iter()
        .all(|p| p.extension().is_some_and(|e| e == "mp3"));

    let merged = if all_wav {
        let dest = output.with_extension("wav");
        let (owned, target) = (parts.to_vec(), dest.clone());
        tokio::task::spawn_blocking(move || merge_wav(&owned, &target))
            .await
            .map_err(|e| TtsError::Io(std::io::Error::other(e)))
            .and_then(|r| r.map_err(TtsError::from))
            .map(|()| dest)
    } else if all_mp3 {
        concat_files(parts, &output.with_extension("mp3")).await
    } else {
        Err(TtsError::Io(std::io::Error::other("mixed audio formats")))
    };

    match merged {
        Ok(dest) => {
            remove_files(parts).await;
            dest
        }
        Err(e) => {
            log::warn!("tts: merging parts failed, keeping last part: {e}");
            let (rest, last) = parts.split_at(parts.len() - 1);
            remove_files(rest).await;
            last[0].clone()
        }
    }
}

async fn remove_files(paths: &[PathBuf]) {
    for p in paths {
        if let Err(e) = tokio::fs::remove_file(p).await {
            log::debug!("tts: could not remove {}: {e}", p.display());
        }
    }
}

async fn concat_files(parts: &[PathBuf], dest: &Path) -> Result<PathBuf, TtsError> {
    let mut all = Vec::new();
    for p in parts {
        all.extend(tokio::fs::read(p).await?);
    }
    tokio::fs::write(dest, all).await?;
    Ok(dest.to_path_buf())
}

async fn write_placeholder(text: &str, output: &Path) -> SynthesisOutput {
    let path = output.with_extension("txt");
    if let Err(e) = tokio::fs::write(&path, text).await {
        log::error!("tts: failed to write placeholder {}: {e}", path.display());
    }
    SynthesisOutput {
        path,
        duration_secs: 0.0,
        kind: ArtifactKind::Placeholder,
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// Writes nothing; reports either a fixed-length MP3 or a placeholder.
#[cfg(test)]
pub struct MockSynthesizer {
    kind: ArtifactKind,
}

#[cfg(test)]
impl MockSynthesizer {
    pub fn audio() -> Self {
        Self {
            kind: ArtifactKind::Audio,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            kind: ArtifactKind::Placeholder,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, output: &Path) -> SynthesisOutput {
        match self.kind {
            ArtifactKind::Audio => SynthesisOutput {
                path: output.with_extension("mp3"),
                duration_secs: 12.5,
                kind: ArtifactKind::Audio,
            },
            ArtifactKind::Placeholder => SynthesisOutput {
                path: output.with_extension("txt"),
                duration_secs: 0.0,
                kind: ArtifactKind::Placeholder,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
