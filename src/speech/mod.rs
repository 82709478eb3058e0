//! Text-to-speech playback
//!
//! This module provides:
//! - The [`SpeechEngine`] boundary and its callback messages
//! - Text normalization for synthesis
//! - A simulated engine for hosts without a platform synthesizer

pub mod simulated;
pub mod tts;

pub use simulated::SimulatedSpeechEngine;
pub use tts::{
    normalize_text_for_tts, select_voice, SpeechCallback, SpeechCallbackKind, SpeechCallbacks,
    SpeechEngine, SpeechOptions, UtteranceId, Voice,
};
