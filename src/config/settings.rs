//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing keys fall back to their defaults, so a partial `settings.toml`
//! only needs the values it overrides.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{AppPaths, DataLayout};

// ---------------------------------------------------------------------------
// DataConfig
// ---------------------------------------------------------------------------

/// Where papers, interpretations, podcasts and the database live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Data directory — `None` means the platform data-local directory.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the summarization LLM (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL including the API version segment, e.g.
    /// `https://dashscope.aliyuncs.com/compatible-mode/v1`.
    pub base_url: String,
    /// API key — `None` for local providers that need no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature for interpretations.
    pub temperature: f32,
    /// Sampling temperature for podcast scripts (slightly looser wording).
    pub script_temperature: f32,
    /// Maximum seconds to wait for a completion.
    pub timeout_secs: u64,
    /// Output language of interpretations and scripts (`"zh"` or `"en"`).
    pub language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".into(),
            api_key: None,
            model: "qwen3-max-2026-01-23".into(),
            temperature: 0.3,
            script_temperature: 0.5,
            timeout_secs: 120,
            language: "zh".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for DashScope speech synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Non-streaming multimodal-generation endpoint.
    pub endpoint: String,
    /// API key — synthesis degrades to a text placeholder when absent.
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub language_type: String,
    /// Per-request timeout for synthesis and audio download.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation"
                .into(),
            api_key: None,
            model: "qwen3-tts-flash".into(),
            voice: "Cherry".into(),
            language_type: "Chinese".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// ArxivConfig
// ---------------------------------------------------------------------------

/// Settings for arXiv metadata queries and PDF downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    /// Atom query endpoint.
    pub api_url: String,
    /// Timeout for PDF downloads.
    pub download_timeout_secs: u64,
    /// Category scanned by `collect` when none is given.
    pub default_category: String,
    /// Number of newest entries inspected per collection run.
    pub collect_max_results: usize,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_url: "http://export.arxiv.org/api/query".into(),
            download_timeout_secs: 60,
            default_category: "physics.hist-ph".into(),
            collect_max_results: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskConfig
// ---------------------------------------------------------------------------

/// Background task execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Size of the worker pool running pipeline tasks.
    pub workers: usize,
    /// Seconds between status polls in the CLI.
    pub poll_interval_secs: u64,
    /// Seconds after which the CLI stops polling a task.
    pub poll_timeout_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval_secs: 2,
            poll_timeout_secs: 15 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// CollectConfig
// ---------------------------------------------------------------------------

/// Daily automatic arXiv collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub auto_collect_enabled: bool,
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub collect_time: String,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            auto_collect_enabled: false,
            collect_time: "00:00".into(),
        }
    }
}

impl CollectConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.collect_time.trim(), "%H:%M")
            .map_err(|e| anyhow!("invalid collect_time {:?} (expected HH:MM): {e}", self.collect_time))
    }

    /// Whether a scheduled run should start at `now`.  At most one run per
    /// matching minute; `last_run` is the start of the previous one.
    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<NaiveDateTime>) -> bool {
        if !self.auto_collect_enabled {
            return false;
        }
        let Ok(at) = self.time_of_day() else {
            return false;
        };
        let minute = |t: NaiveDateTime| (t.date(), t.hour(), t.minute());
        now.hour() == at.hour()
            && now.minute() == at.minute()
            && last_run.map_or(true, |prev| minute(prev) != minute(now))
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use paper_axon::config::AppConfig;
///
/// // Load (returns Default when file is missing), then apply env overrides
/// let config = AppConfig::load().unwrap().with_env_overrides();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub arxiv: ArxivConfig,
    pub tasks: TaskConfig,
    pub collect: CollectConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Recognised keys: `DATA_DIR`, `DASHSCOPE_API_KEY` (LLM and TTS),
    /// `DASHSCOPE_BASE_URL`, `QWEN_MODEL`, `QWEN_TTS_MODEL`.  Empty values
    /// are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("DATA_DIR") {
            self.data.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(key) = get("DASHSCOPE_API_KEY") {
            self.llm.api_key = Some(key.clone());
            self.tts.api_key = Some(key);
        }
        if let Some(url) = get("DASHSCOPE_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("QWEN_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = get("QWEN_TTS_MODEL") {
            self.tts.model = model;
        }
        self
    }

    /// Resolve the on-disk layout for this configuration.
    pub fn layout(&self) -> DataLayout {
        let root = self
            .data
            .data_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().default_data_dir);
        DataLayout::new(root)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
