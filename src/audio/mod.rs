//! Audio capture and shared audio-mode management
//!
//! - [`recorder`]: microphone recording with permission gating
//! - [`mode`]: serialized transitions of the shared audio session
//! - [`simulated`] and `input` (cpal): capture devices

#[cfg(feature = "audio-io")]
pub mod input;
pub mod mode;
pub mod recorder;
pub mod simulated;
pub mod wav;

#[cfg(feature = "audio-io")]
pub use input::CpalCaptureDevice;
pub use mode::{
    AudioModeApi, AudioModeCoordinator, AudioModeSettings, AudioModeState, DesktopAudioMode,
    SettleConfig,
};
pub use recorder::{
    AudioRecorder, CaptureDevice, CaptureHandle, PermissionStatus, RecorderConfig, Recording,
    RecordingQuality,
};
pub use simulated::SimulatedCaptureDevice;
pub use wav::{read_wav, write_wav};
