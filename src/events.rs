//! Outward notifications: state changes, recording ticks and user-facing alerts
//!
//! Everything the presentation layer needs to react to is delivered as a
//! [`VoiceEvent`] over a crossbeam channel, polled with `try_recv` from the UI loop.

use crate::session::VoiceSessionState;
use crate::MurmurError;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Severity of an alert shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// Buttons offered alongside an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertAction {
    Dismiss,
    /// Run the permission prompt again
    RetryPermission,
    /// Jump to the platform's settings page for this app
    OpenSettings,
}

/// A user-visible alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub actions: Vec<AlertAction>,
}

impl Alert {
    /// Build an error alert from a crate error, using its user-facing message
    pub fn from_error(title: impl Into<String>, error: &MurmurError) -> Self {
        let level = if error.is_recoverable() {
            AlertLevel::Warning
        } else {
            AlertLevel::Error
        };

        Self {
            level,
            title: title.into(),
            message: error.user_message(),
            actions: vec![AlertAction::Dismiss],
        }
    }

    /// Alert shown when microphone access was refused
    pub fn permission_denied() -> Self {
        Self {
            level: AlertLevel::Warning,
            title: "Microphone access".to_string(),
            message: MurmurError::PermissionDenied.user_message(),
            actions: vec![
                AlertAction::RetryPermission,
                AlertAction::OpenSettings,
                AlertAction::Dismiss,
            ],
        }
    }

    pub fn offers_retry(&self) -> bool {
        self.actions.contains(&AlertAction::RetryPermission)
    }
}

/// Events emitted by the voice core
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// The session moved between states
    StateChanged {
        from: VoiceSessionState,
        to: VoiceSessionState,
    },

    /// One more second of audio was captured
    DurationTick {
        /// Recording this tick belongs to
        recording: Uuid,
        seconds: u32,
    },

    /// The transcript for the current turn is available
    TranscriptReady(String),

    /// Reply text is available (also used for error replies)
    ReplyReady(String),

    /// The speech engine reported that playback began
    SpeechStarted,

    /// Something the user should be told about
    Alert(Alert),
}

/// Non-blocking sender for [`VoiceEvent`]s
///
/// Emitting never blocks the session: if the UI is not draining the channel,
/// events are dropped and logged.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<VoiceEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<VoiceEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel(capacity: usize) -> (Self, Receiver<VoiceEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: VoiceEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Event channel disconnected");
            }
        }
    }

    pub fn alert(&self, alert: Alert) {
        self.emit(VoiceEvent::Alert(alert));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_alert_offers_retry() {
        let alert = Alert::permission_denied();
        assert!(alert.offers_retry());
        assert_eq!(alert.level, AlertLevel::Warning);
    }

    #[test]
    fn test_error_alert_uses_user_message() {
        let err = MurmurError::CaptureStopFailed("no data".into());
        let alert = Alert::from_error("Recording", &err);
        assert_eq!(alert.message, err.user_message());
        assert!(!alert.offers_retry());
    }

    #[test]
    fn test_sink_drops_when_full() {
        let (sink, rx) = EventSink::channel(1);
        sink.emit(VoiceEvent::SpeechStarted);
        sink.emit(VoiceEvent::ReplyReady("dropped".into()));

        assert_eq!(rx.try_recv().ok(), Some(VoiceEvent::SpeechStarted));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_survives_disconnect() {
        let (sink, rx) = EventSink::channel(4);
        drop(rx);
        sink.emit(VoiceEvent::SpeechStarted);
    }
}
