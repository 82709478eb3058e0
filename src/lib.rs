pub mod audio;
pub mod events;
pub mod integration;
pub mod llm;
pub mod session;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MurmurError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Failed to start recording: {0}")]
    CaptureStartFailed(String),

    #[error("Failed to stop recording: {0}")]
    CaptureStopFailed(String),

    #[error("Response generation failed: {0}")]
    GenerationFailed(String),

    #[error("Speech playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Audio mode error: {0}")]
    AudioModeError(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for MurmurError {
    fn from(e: std::io::Error) -> Self {
        MurmurError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(e: serde_json::Error) -> Self {
        MurmurError::ConfigError(e.to_string())
    }
}

impl MurmurError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user can grant access and try again
            MurmurError::PermissionDenied => true,
            // Caller bug, the session never issues a second start
            MurmurError::AlreadyRecording => false,
            MurmurError::CaptureStartFailed(_) => true,
            MurmurError::CaptureStopFailed(_) => true,
            MurmurError::GenerationFailed(_) => true,
            MurmurError::PlaybackFailed(_) => true,
            MurmurError::AudioModeError(_) => true,
            // Hardware errors may require user intervention
            MurmurError::AudioDeviceError(_) => false,
            MurmurError::ConfigError(_) => false,
            MurmurError::IOError(_) => false,
            MurmurError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            MurmurError::PermissionDenied => {
                "Microphone access is needed to talk. Please allow it and try again.".to_string()
            }
            MurmurError::AlreadyRecording => "A recording is already running.".to_string(),
            MurmurError::CaptureStartFailed(_) => {
                "Could not start recording. Please try again.".to_string()
            }
            MurmurError::CaptureStopFailed(_) => {
                "Nothing was recorded. Please hold the button a little longer.".to_string()
            }
            MurmurError::GenerationFailed(_) => {
                "Sorry, I couldn't come up with a reply. Please try again.".to_string()
            }
            MurmurError::PlaybackFailed(_) => {
                "Could not play the reply aloud. Please try again.".to_string()
            }
            MurmurError::AudioModeError(_) => {
                "The audio system is busy. Please try again in a moment.".to_string()
            }
            MurmurError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            MurmurError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            MurmurError::IOError(_) => "File system error occurred.".to_string(),
            MurmurError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;
