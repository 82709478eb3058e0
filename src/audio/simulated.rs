//! Capture device that produces a quiet tone instead of reading a microphone
//!
//! Used on machines without an input device and as the default in the demo. It
//! behaves like a real device: it gates on a permission state, writes a WAV file on
//! finalize, and fails when the capture was too short to contain any audio.

use crate::audio::recorder::{CaptureDevice, CaptureHandle, PermissionStatus, RecordingQuality};
use crate::audio::wav::write_wav;
use crate::{MurmurError, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct SimulatedCaptureDevice {
    permission: Mutex<PermissionStatus>,
    grant_on_request: bool,
    output_dir: PathBuf,
    min_capture: Duration,
}

impl SimulatedCaptureDevice {
    pub fn new(permission: PermissionStatus, grant_on_request: bool) -> Self {
        Self {
            permission: Mutex::new(permission),
            grant_on_request,
            output_dir: std::env::temp_dir().join("murmur"),
            min_capture: Duration::from_millis(200),
        }
    }

    /// Permission already granted
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, true)
    }

    /// Permission refused, and refused again when prompted
    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied, false)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Captures shorter than this produce no data
    pub fn with_min_capture(mut self, min_capture: Duration) -> Self {
        self.min_capture = min_capture;
        self
    }
}

impl CaptureDevice for SimulatedCaptureDevice {
    fn check_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        let status = *self.permission.lock();
        Box::pin(async move { Ok(status) })
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        Box::pin(async move {
            let mut permission = self.permission.lock();
            if *permission != PermissionStatus::Granted {
                *permission = if self.grant_on_request {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                };
            }
            Ok(*permission)
        })
    }

    fn create_capture(
        &self,
        quality: RecordingQuality,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureHandle>>> {
        Box::pin(async move {
            if *self.permission.lock() != PermissionStatus::Granted {
                return Err(MurmurError::PermissionDenied);
            }

            let capture = SimulatedCapture {
                id: Uuid::new_v4(),
                started: Instant::now(),
                quality,
                output_dir: self.output_dir.clone(),
                min_capture: self.min_capture,
            };
            debug!("Simulated capture {} opened", capture.id);
            Ok(Box::new(capture) as Box<dyn CaptureHandle>)
        })
    }
}

struct SimulatedCapture {
    id: Uuid,
    started: Instant,
    quality: RecordingQuality,
    output_dir: PathBuf,
    min_capture: Duration,
}

impl SimulatedCapture {
    fn tone(&self, elapsed: Duration) -> Vec<f32> {
        let rate = self.quality.sample_rate();
        let channels = self.quality.channels() as usize;
        let frames = (elapsed.as_secs_f64() * rate as f64) as usize;

        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let value = (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.05;
            samples.extend(std::iter::repeat(value).take(channels));
        }
        samples
    }
}

impl CaptureHandle for SimulatedCapture {
    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<String>> {
        Box::pin(async move {
            let elapsed = self.started.elapsed();
            if elapsed < self.min_capture {
                return Err(MurmurError::CaptureStopFailed(format!(
                    "no audio data captured ({:?})",
                    elapsed
                )));
            }

            let path = self.output_dir.join(format!("recording-{}.wav", self.id));
            write_wav(
                &path,
                &self.tone(elapsed),
                self.quality.sample_rate(),
                self.quality.channels(),
            )?;
            Ok(path.to_string_lossy().into_owned())
        })
    }

    fn discard(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            debug!("Simulated capture {} discarded", self.id);
            Ok(())
        })
    }
}
