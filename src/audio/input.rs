use crate::audio::recorder::{CaptureDevice, CaptureHandle, PermissionStatus, RecordingQuality};
use crate::audio::wav::write_wav;
use crate::{MurmurError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Microphone capture through the default cpal input device
///
/// cpal streams cannot move between threads, so each capture runs its stream on a
/// dedicated thread and hands the samples back when stopped.
pub struct CpalCaptureDevice {
    output_dir: PathBuf,
}

impl CpalCaptureDevice {
    /// Create a capture device, failing if no input device is present
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        if !Self::is_available() {
            return Err(MurmurError::AudioDeviceError(
                "No input device available".into(),
            ));
        }
        Ok(Self {
            output_dir: output_dir.into(),
        })
    }

    pub fn is_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    // Desktop hosts have no permission prompt; an accessible device means granted
    fn permission() -> PermissionStatus {
        if Self::is_available() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn check_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        Box::pin(async { Ok(Self::permission()) })
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        Box::pin(async { Ok(Self::permission()) })
    }

    fn create_capture(
        &self,
        quality: RecordingQuality,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureHandle>>> {
        let output_path = self
            .output_dir
            .join(format!("recording-{}.wav", Uuid::new_v4()));

        Box::pin(async move {
            let (ready_tx, ready_rx) = bounded::<Result<(u32, u16)>>(1);
            let (stop_tx, stop_rx) = bounded::<()>(1);

            let worker = thread::spawn(move || {
                let samples = Arc::new(Mutex::new(Vec::new()));
                let stream = match open_stream(Arc::clone(&samples)) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Vec::new();
                    }
                };

                // Runs until stopped or the handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                let captured = std::mem::take(&mut *samples.lock());
                captured
            });

            let (sample_rate, channels) = tokio::task::spawn_blocking(move || ready_rx.recv())
                .await
                .map_err(|e| MurmurError::CaptureStartFailed(e.to_string()))?
                .map_err(|e| MurmurError::CaptureStartFailed(e.to_string()))??;

            info!(
                "Capturing from default input: {} Hz, {} channels",
                sample_rate, channels
            );

            Ok(Box::new(CpalCapture {
                stop_tx,
                worker,
                sample_rate,
                channels,
                quality,
                output_path,
            }) as Box<dyn CaptureHandle>)
        })
    }
}

fn open_stream(samples: Arc<Mutex<Vec<f32>>>) -> Result<(cpal::Stream, u32, u16)> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| MurmurError::AudioDeviceError("No input device available".into()))?;

    let config: cpal::StreamConfig = device
        .default_input_config()
        .map_err(|e| MurmurError::AudioDeviceError(format!("Failed to get input config: {}", e)))?
        .into();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                samples.lock().extend_from_slice(data);
            },
            |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| {
            MurmurError::AudioDeviceError(format!("Failed to build input stream: {}", e))
        })?;

    stream.play().map_err(|e| {
        MurmurError::AudioDeviceError(format!("Failed to start input stream: {}", e))
    })?;

    Ok((stream, config.sample_rate.0, config.channels))
}

struct CpalCapture {
    stop_tx: Sender<()>,
    worker: JoinHandle<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    quality: RecordingQuality,
    output_path: PathBuf,
}

impl CpalCapture {
    fn join(self) -> Result<(Vec<f32>, u32, u16, RecordingQuality, PathBuf)> {
        let _ = self.stop_tx.send(());
        let samples = self
            .worker
            .join()
            .map_err(|_| MurmurError::AudioDeviceError("capture thread panicked".into()))?;
        Ok((
            samples,
            self.sample_rate,
            self.channels,
            self.quality,
            self.output_path,
        ))
    }
}

/// Average interleaved frames down to one channel
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

impl CaptureHandle for CpalCapture {
    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<String>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let (samples, rate, channels, quality, path) = self.join()?;
                if samples.is_empty() {
                    return Err(MurmurError::CaptureStopFailed(
                        "no audio data captured".into(),
                    ));
                }

                let (samples, channels) = match quality {
                    RecordingQuality::Low => (downmix(&samples, channels), 1),
                    RecordingQuality::High => (samples, channels),
                };
                write_wav(&path, &samples, rate, channels)?;
                Ok(path.to_string_lossy().into_owned())
            })
            .await
            .map_err(|e| MurmurError::CaptureStopFailed(e.to_string()))?
        })
    }

    fn discard(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let samples = tokio::task::spawn_blocking(move || self.join())
                .await
                .map_err(|e| MurmurError::AudioDeviceError(e.to_string()))??
                .0;
            debug!("Discarded {} captured samples", samples.len());
            Ok(())
        })
    }
}
