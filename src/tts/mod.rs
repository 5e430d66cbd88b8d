//! Synthesis collaborator: podcast scripts to audio.
//!
//! This module provides:
//! * [`Synthesizer`] — async trait; never fails, degrades to a placeholder.
//! * [`DashScopeSynthesizer`] — Qwen TTS over DashScope.
//! * [`SynthesisOutput`] / [`ArtifactKind`] — produced file and its kind.
//! * [`split_text`] — sentence-aware segmentation for the per-request limit.
//! * [`merge_wav`] — join multi-part WAV output with `hound`.

pub mod synthesizer;
pub mod text;
pub mod wav;

pub use synthesizer::{
    is_placeholder_artifact, ArtifactKind, DashScopeSynthesizer, SynthesisOutput, Synthesizer,
    TtsError,
};
pub use text::{split_text, truncate_bytes};
pub use wav::merge_wav;

#[cfg(test)]
pub use synthesizer::MockSynthesizer;
