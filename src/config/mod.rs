//! Configuration module for Paper Axon.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, DataLayout};
pub use settings::{
    AppConfig, ArxivConfig, CollectConfig, DataConfig, LlmConfig, TaskConfig, TtsConfig,
};
