//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components.

use crate::audio::mode::SettleConfig;
use crate::audio::recorder::RecorderConfig;
use crate::llm::config::GenerationConfig;
use crate::speech::tts::SpeechOptions;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Configuration for the complete voice core
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Microphone recording
    pub recorder: RecorderConfig,

    /// Audio-mode settle timing
    pub settle: SettleConfig,

    /// Reply generation
    pub generation: GenerationConfig,

    /// Text-to-speech voice parameters
    pub speech: SpeechOptions,

    /// Use the real microphone when one is available
    pub enable_audio_input: bool,

    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig::default(),
            settle: SettleConfig::default(),
            generation: GenerationConfig::default(),
            speech: SpeechOptions::default(),
            enable_audio_input: true,
            event_capacity: 256,
        }
    }
}

impl VoiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: VoiceConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Set the speech options
    pub fn with_speech(mut self, speech: SpeechOptions) -> Self {
        self.speech = speech;
        self
    }

    /// Set the settle timing
    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// Set the generation settings
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Set the generation timeout
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation = self.generation.with_timeout(timeout);
        self
    }

    /// Set where recordings are written
    pub fn with_output_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.recorder.output_dir = dir.into();
        self
    }

    /// Always use the simulated microphone
    pub fn without_audio_input(mut self) -> Self {
        self.enable_audio_input = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.recorder.validate()?;
        self.settle.validate()?;
        self.generation.validate()?;
        self.speech.validate()?;
        if self.event_capacity == 0 {
            return Err(crate::MurmurError::ConfigError(
                "event_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
