//! Microphone recording with permission gating and duration tracking
//!
//! The recorder owns at most one [`RecordingHandle`]. Platform failures never
//! escape as panics: they are logged, surfaced as an [`Alert`], and reported to the
//! caller as an error value or `None`.

use crate::audio::mode::AudioModeCoordinator;
use crate::events::{Alert, EventSink, VoiceEvent};
use crate::{MurmurError, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Platform microphone permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Capture quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    High,
    Low,
}

impl RecordingQuality {
    pub fn sample_rate(&self) -> u32 {
        match self {
            RecordingQuality::High => 44100,
            RecordingQuality::Low => 16000,
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            RecordingQuality::High => 2,
            RecordingQuality::Low => 1,
        }
    }
}

/// An open capture session on the platform microphone
pub trait CaptureHandle: Send + Sync {
    /// Stop capturing and return the location of the recorded file
    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<String>>;

    /// Stop capturing and throw the data away
    fn discard(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Platform microphone
pub trait CaptureDevice: Send + Sync {
    fn check_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>>;

    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>>;

    fn create_capture(
        &self,
        quality: RecordingQuality,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureHandle>>>;
}

/// Recorder settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub quality: RecordingQuality,

    /// Interval of the duration counter
    pub tick_interval_ms: u64,

    /// Where finished recordings are written
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            quality: RecordingQuality::High,
            tick_interval_ms: 1000,
            output_dir: std::env::temp_dir().join("murmur"),
        }
    }
}

impl RecorderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(MurmurError::ConfigError(
                "tick_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A finished recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub uri: String,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
}

/// One in-progress capture
struct RecordingHandle {
    id: Uuid,
    capture: Box<dyn CaptureHandle>,
    duration: Arc<AtomicU32>,
    ticker: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl RecordingHandle {
    fn seconds(&self) -> u32 {
        self.duration.load(Ordering::SeqCst)
    }
}

pub struct AudioRecorder {
    device: Arc<dyn CaptureDevice>,
    modes: Arc<AudioModeCoordinator>,
    events: EventSink,
    config: RecorderConfig,
    active: Option<RecordingHandle>,
    last_duration: u32,
}

impl AudioRecorder {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        modes: Arc<AudioModeCoordinator>,
        events: EventSink,
        config: RecorderConfig,
    ) -> Self {
        Self {
            device,
            modes,
            events,
            config,
            active: None,
            last_duration: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Seconds captured by the current recording, or by the last one
    pub fn duration_secs(&self) -> u32 {
        self.active
            .as_ref()
            .map(RecordingHandle::seconds)
            .unwrap_or(self.last_duration)
    }

    /// Query the permission state without prompting
    pub async fn check_permission(&self) -> PermissionStatus {
        match self.device.check_permission().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Permission check failed: {}", e);
                PermissionStatus::Undetermined
            }
        }
    }

    /// Prompt for microphone access
    ///
    /// A refusal raises an alert offering a retry. Never returns `Undetermined`.
    pub async fn request_permission(&self) -> PermissionStatus {
        let status = match self.device.request_permission().await {
            Ok(PermissionStatus::Granted) => PermissionStatus::Granted,
            Ok(other) => {
                info!("Microphone permission not granted: {:?}", other);
                PermissionStatus::Denied
            }
            Err(e) => {
                warn!("Permission request failed: {}", e);
                PermissionStatus::Denied
            }
        };

        if status == PermissionStatus::Denied {
            self.events.alert(Alert::permission_denied());
        }
        status
    }

    /// Begin capturing
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            error!("start() called while a recording is active");
            return Err(MurmurError::AlreadyRecording);
        }

        if self.check_permission().await != PermissionStatus::Granted
            && self.request_permission().await != PermissionStatus::Granted
        {
            return Err(MurmurError::PermissionDenied);
        }

        if let Err(e) = self.modes.enter_recording_mode().await {
            return Err(self.start_failed(e.to_string()).await);
        }

        let capture = match self.device.create_capture(self.config.quality).await {
            Ok(capture) => capture,
            Err(e) => return Err(self.start_failed(e.to_string()).await),
        };

        let id = Uuid::new_v4();
        let duration = Arc::new(AtomicU32::new(0));
        let ticker = spawn_ticker(
            id,
            Arc::clone(&duration),
            self.config.tick_interval(),
            self.events.clone(),
        );

        self.last_duration = 0;
        self.active = Some(RecordingHandle {
            id,
            capture,
            duration,
            ticker,
            started_at: Utc::now(),
        });

        info!("Recording {} started ({:?})", id, self.config.quality);
        Ok(())
    }

    /// Finish the recording and return its location and length
    ///
    /// Returns `None` when nothing is recording or when finalization fails.
    pub async fn stop(&mut self) -> Option<Recording> {
        let Some(handle) = self.active.take() else {
            debug!("stop() with no active recording");
            return None;
        };

        handle.ticker.abort();
        let duration_secs = handle.seconds();
        self.last_duration = duration_secs;

        let result = handle.capture.finalize().await;
        self.settle().await;

        match result {
            Ok(uri) => {
                info!(
                    "Recording {} stopped after {}s: {}",
                    handle.id, duration_secs, uri
                );
                Some(Recording {
                    uri,
                    duration_secs,
                    started_at: handle.started_at,
                })
            }
            Err(e) => {
                let err = MurmurError::CaptureStopFailed(e.to_string());
                warn!("Recording {} could not be finalized: {}", handle.id, e);
                self.events.alert(Alert::from_error("Recording", &err));
                None
            }
        }
    }

    /// Abort the recording, discarding captured audio
    pub async fn cancel(&mut self) {
        match self.active.take() {
            Some(handle) => {
                handle.ticker.abort();
                self.last_duration = 0;
                if let Err(e) = handle.capture.discard().await {
                    warn!("Discarding recording {} failed: {}", handle.id, e);
                }
                info!("Recording {} cancelled", handle.id);
                self.settle().await;
            }
            None => {
                // start() may have enabled recording mode before failing
                self.settle().await;
            }
        }
    }

    async fn start_failed(&self, reason: String) -> MurmurError {
        let err = MurmurError::CaptureStartFailed(reason);
        error!("{}", err);
        self.events.alert(Alert::from_error("Recording", &err));
        self.settle().await;
        err
    }

    async fn settle(&self) {
        if let Err(e) = self.modes.settle_to_neutral().await {
            warn!("Audio mode settle failed: {}", e);
        }
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.ticker.abort();
        }
    }
}

fn spawn_ticker(
    id: Uuid,
    duration: Arc<AtomicU32>,
    period: Duration,
    events: EventSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            let seconds = duration.fetch_add(1, Ordering::SeqCst) + 1;
            events.emit(VoiceEvent::DurationTick {
                recording: id,
                seconds,
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mode::{DesktopAudioMode, SettleConfig};
    use crate::audio::simulated::SimulatedCaptureDevice;

    fn recorder(device: SimulatedCaptureDevice) -> (AudioRecorder, crossbeam_channel::Receiver<VoiceEvent>) {
        let (events, rx) = EventSink::channel(64);
        let modes = Arc::new(AudioModeCoordinator::new(
            Arc::new(DesktopAudioMode),
            SettleConfig::default(),
        ));
        let config = RecorderConfig {
            output_dir: std::env::temp_dir().join("murmur-recorder-tests"),
            ..Default::default()
        };
        (
            AudioRecorder::new(Arc::new(device), modes, events, config),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_counts_ticks() {
        let (mut rec, rx) = recorder(SimulatedCaptureDevice::granted());
        rec.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(rec.duration_secs(), 3);

        let recording = rec.stop().await.expect("recording");
        assert_eq!(recording.duration_secs, 3);
        assert!(!rec.is_recording());

        let ticks: Vec<u32> = rx
            .try_iter()
            .filter_map(|e| match e {
                VoiceEvent::DurationTick { seconds, .. } => Some(seconds),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![1, 2, 3]);
        let _ = std::fs::remove_file(&recording.uri);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let (mut rec, _rx) = recorder(SimulatedCaptureDevice::granted());
        rec.start().await.unwrap();
        assert_eq!(rec.start().await, Err(MurmurError::AlreadyRecording));
        rec.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_recording_is_noop() {
        let (mut rec, rx) = recorder(SimulatedCaptureDevice::granted());
        assert!(rec.stop().await.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_alerts_with_retry() {
        let (mut rec, rx) = recorder(SimulatedCaptureDevice::denied());
        assert_eq!(rec.start().await, Err(MurmurError::PermissionDenied));
        assert!(!rec.is_recording());

        match rx.try_recv() {
            Ok(VoiceEvent::Alert(alert)) => assert!(alert.offers_retry()),
            other => panic!("expected permission alert, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_handle_and_resets_duration() {
        let (mut rec, _rx) = recorder(SimulatedCaptureDevice::granted());
        rec.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        rec.cancel().await;

        assert!(!rec.is_recording());
        assert_eq!(rec.duration_secs(), 0);
        rec.cancel().await;
    }
}
