//! Shared platform audio-mode coordination
//!
//! Recording and speech synthesis both depend on the process-wide audio session.
//! Switching straight from recording to playback makes the driver fail or distort
//! output, so every transition out of recording goes through
//! [`AudioModeCoordinator::settle_to_neutral`]: wait for the driver to release the
//! capture session, force neutral mode, and wait again before playback may begin.

use crate::{MurmurError, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tri-state descriptor of the shared hardware audio configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioModeState {
    RecordingEnabled,
    Neutral,
    PlaybackPermissive,
}

impl fmt::Display for AudioModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioModeState::RecordingEnabled => "recording-enabled",
            AudioModeState::Neutral => "neutral",
            AudioModeState::PlaybackPermissive => "playback-permissive",
        };
        f.write_str(name)
    }
}

/// Flags handed to the platform audio-mode API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioModeSettings {
    pub allow_recording: bool,
    pub allow_silent_playback: bool,
    pub duck_others: bool,
    pub stay_active_in_background: bool,
}

impl AudioModeSettings {
    pub fn for_state(state: AudioModeState) -> Self {
        match state {
            AudioModeState::RecordingEnabled => Self {
                allow_recording: true,
                allow_silent_playback: true,
                duck_others: true,
                stay_active_in_background: false,
            },
            AudioModeState::Neutral => Self {
                allow_recording: false,
                allow_silent_playback: false,
                duck_others: false,
                stay_active_in_background: false,
            },
            AudioModeState::PlaybackPermissive => Self {
                allow_recording: false,
                allow_silent_playback: true,
                duck_others: false,
                stay_active_in_background: false,
            },
        }
    }
}

/// Platform API that applies an audio mode
pub trait AudioModeApi: Send + Sync {
    fn set_mode(&self, settings: AudioModeSettings) -> BoxFuture<'_, Result<()>>;
}

/// Desktop platforms have no shared audio session to configure
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopAudioMode;

impl AudioModeApi for DesktopAudioMode {
    fn set_mode(&self, settings: AudioModeSettings) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            debug!("Desktop audio mode: {:?}", settings);
            Ok(())
        })
    }
}

/// Timing of the settle sequence
///
/// Driver readiness is not observable, so waits are fixed but configurable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait after the capture session is closed, before touching the mode
    pub release_delay_ms: u64,

    /// Wait after each neutral-mode application
    pub settle_delay_ms: u64,

    /// How many times neutral mode is applied and waited out
    pub settle_passes: u32,

    /// Wait after enabling recording before capture may start
    pub recording_settle_ms: u64,

    /// Upper bound for a single platform mode switch
    pub mode_switch_timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            release_delay_ms: 250,
            settle_delay_ms: 400,
            settle_passes: 2,
            recording_settle_ms: 100,
            mode_switch_timeout_ms: 2000,
        }
    }
}

impl SettleConfig {
    /// No waiting at all, for hosts without a shared audio session
    pub fn immediate() -> Self {
        Self {
            release_delay_ms: 0,
            settle_delay_ms: 0,
            settle_passes: 1,
            recording_settle_ms: 0,
            ..Default::default()
        }
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn recording_settle(&self) -> Duration {
        Duration::from_millis(self.recording_settle_ms)
    }

    pub fn mode_switch_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_switch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.settle_passes == 0 {
            return Err(MurmurError::ConfigError(
                "settle_passes must be at least 1".into(),
            ));
        }
        if self.mode_switch_timeout_ms == 0 {
            return Err(MurmurError::ConfigError(
                "mode_switch_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Single owner of every audio-mode transition
///
/// The async mutex serializes transitions: a settle sequence holds it across its
/// waits, so nothing else can reconfigure the session halfway through.
pub struct AudioModeCoordinator {
    api: Arc<dyn AudioModeApi>,
    config: SettleConfig,
    state: Mutex<AudioModeState>,
}

impl AudioModeCoordinator {
    pub fn new(api: Arc<dyn AudioModeApi>, config: SettleConfig) -> Self {
        Self {
            api,
            config,
            state: Mutex::new(AudioModeState::Neutral),
        }
    }

    pub fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Current mode, waiting for any transition in progress to finish
    pub async fn current(&self) -> AudioModeState {
        *self.state.lock().await
    }

    /// Allow microphone input; returns once the platform has settled
    pub async fn enter_recording_mode(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.apply(AudioModeState::RecordingEnabled).await?;
        *state = AudioModeState::RecordingEnabled;
        tokio::time::sleep(self.config.recording_settle()).await;
        info!("Audio mode: {}", *state);
        Ok(())
    }

    /// Release the recording session and return to neutral
    ///
    /// Idempotent: does nothing when the mode is already neutral.
    pub async fn settle_to_neutral(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == AudioModeState::Neutral {
            debug!("Audio mode already neutral, skipping settle");
            return Ok(());
        }

        debug!("Settling audio mode from {}", *state);
        tokio::time::sleep(self.config.release_delay()).await;

        for pass in 0..self.config.settle_passes {
            self.apply(AudioModeState::Neutral).await?;
            *state = AudioModeState::Neutral;
            tokio::time::sleep(self.config.settle_delay()).await;
            debug!("Settle pass {}/{} done", pass + 1, self.config.settle_passes);
        }

        info!("Audio mode: {}", *state);
        Ok(())
    }

    /// Mark the session as playing speech
    ///
    /// Runs the settle sequence first if a recording mode is somehow still active.
    pub async fn enter_playback_mode(&self) -> Result<()> {
        if self.current().await == AudioModeState::RecordingEnabled {
            warn!("Playback requested while recording mode is active, settling first");
            self.settle_to_neutral().await?;
        }

        let mut state = self.state.lock().await;
        self.apply(AudioModeState::PlaybackPermissive).await?;
        *state = AudioModeState::PlaybackPermissive;
        debug!("Audio mode: {}", *state);
        Ok(())
    }

    /// Drop back to neutral after playback; no release wait is needed
    pub async fn leave_playback_mode(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != AudioModeState::PlaybackPermissive {
            return Ok(());
        }
        self.apply(AudioModeState::Neutral).await?;
        *state = AudioModeState::Neutral;
        debug!("Audio mode: {}", *state);
        Ok(())
    }

    async fn apply(&self, target: AudioModeState) -> Result<()> {
        let settings = AudioModeSettings::for_state(target);
        match tokio::time::timeout(self.config.mode_switch_timeout(), self.api.set_mode(settings))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(MurmurError::AudioModeError(format!(
                "switching to {} timed out after {:?}",
                target,
                self.config.mode_switch_timeout()
            ))),
        }
    }
}
