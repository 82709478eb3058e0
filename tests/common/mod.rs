//! Shared test doubles for the voice session integration tests
//!
//! Every mock appends to one [`CallLog`] so tests can assert the order in which
//! the session touched the platform.

#![allow(dead_code)]

use futures::future::BoxFuture;
use murmur::audio::{
    AudioModeApi, AudioModeSettings, CaptureDevice, CaptureHandle, PermissionStatus,
    RecordingQuality, SettleConfig,
};
use murmur::events::VoiceEvent;
use murmur::integration::VoiceConfig;
use murmur::llm::{InputKind, ResponseGenerator};
use murmur::session::{SessionComponents, VoiceSession, VoiceSessionState};
use murmur::speech::{SpeechCallbacks, SpeechEngine, SpeechOptions, Voice};
use murmur::{MurmurError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ordered record of platform calls, shared by all mocks
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e.starts_with(prefix))
    }

    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().rposition(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct MockCaptureDevice {
    log: CallLog,
    permission: Mutex<PermissionStatus>,
    grant_on_request: AtomicBool,
    fail_finalize: AtomicBool,
}

impl MockCaptureDevice {
    pub fn granted(log: CallLog) -> Self {
        Self {
            log,
            permission: Mutex::new(PermissionStatus::Granted),
            grant_on_request: AtomicBool::new(true),
            fail_finalize: AtomicBool::new(false),
        }
    }

    pub fn denied(log: CallLog) -> Self {
        Self {
            log,
            permission: Mutex::new(PermissionStatus::Denied),
            grant_on_request: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
        }
    }

    /// The next permission prompt is accepted
    pub fn grant_on_request(&self) {
        self.grant_on_request.store(true, Ordering::SeqCst);
    }

    /// Finalizing a capture fails as if no audio was captured
    pub fn fail_finalize(&self) {
        self.fail_finalize.store(true, Ordering::SeqCst);
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn check_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        let status = *self.permission.lock();
        Box::pin(async move { Ok(status) })
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus>> {
        self.log.push("request_permission");
        let status = if self.grant_on_request.load(Ordering::SeqCst) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        *self.permission.lock() = status;
        Box::pin(async move { Ok(status) })
    }

    fn create_capture(
        &self,
        _quality: RecordingQuality,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureHandle>>> {
        self.log.push("capture.start");
        let capture = MockCapture {
            log: self.log.clone(),
            fail_finalize: self.fail_finalize.load(Ordering::SeqCst),
        };
        Box::pin(async move { Ok(Box::new(capture) as Box<dyn CaptureHandle>) })
    }
}

struct MockCapture {
    log: CallLog,
    fail_finalize: bool,
}

impl CaptureHandle for MockCapture {
    fn finalize(self: Box<Self>) -> BoxFuture<'static, Result<String>> {
        self.log.push("capture.finalize");
        Box::pin(async move {
            if self.fail_finalize {
                Err(MurmurError::CaptureStopFailed("no audio data".into()))
            } else {
                Ok("file:///tmp/murmur/mock-recording.wav".to_string())
            }
        })
    }

    fn discard(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        self.log.push("capture.discard");
        Box::pin(async { Ok(()) })
    }
}

/// Logs each mode switch as `mode.recording`, `mode.neutral` or `mode.playback`
pub struct MockAudioMode {
    log: CallLog,
}

impl MockAudioMode {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl AudioModeApi for MockAudioMode {
    fn set_mode(&self, settings: AudioModeSettings) -> BoxFuture<'_, Result<()>> {
        let name = if settings.allow_recording {
            "mode.recording"
        } else if settings.allow_silent_playback {
            "mode.playback"
        } else {
            "mode.neutral"
        };
        self.log.push(name);
        Box::pin(async { Ok(()) })
    }
}

/// Speech engine that never finishes on its own
///
/// Tests drive playback through the stored callbacks.
pub struct MockSpeechEngine {
    log: CallLog,
    callbacks: Mutex<Option<SpeechCallbacks>>,
    fail_speak: AtomicBool,
}

impl MockSpeechEngine {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            callbacks: Mutex::new(None),
            fail_speak: AtomicBool::new(false),
        }
    }

    pub fn fail_speak(&self) {
        self.fail_speak.store(true, Ordering::SeqCst);
    }

    /// Callbacks of the most recent `speak` call
    pub fn callbacks(&self) -> SpeechCallbacks {
        self.callbacks
            .lock()
            .clone()
            .expect("speak was never called")
    }

    pub fn finish(&self) {
        self.callbacks().on_done();
    }
}

impl SpeechEngine for MockSpeechEngine {
    fn speak<'a>(
        &'a self,
        text: &'a str,
        _options: &'a SpeechOptions,
        callbacks: SpeechCallbacks,
    ) -> BoxFuture<'a, Result<()>> {
        self.log.push(format!("speak:{}", text));
        Box::pin(async move {
            if self.fail_speak.load(Ordering::SeqCst) {
                return Err(MurmurError::PlaybackFailed("synthesizer unavailable".into()));
            }
            *self.callbacks.lock() = Some(callbacks);
            Ok(())
        })
    }

    fn stop(&self) -> Result<()> {
        self.log.push("speech.stop");
        Ok(())
    }

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<Voice>>> {
        self.log.push("list_voices");
        Box::pin(async {
            Ok(vec![Voice {
                id: "mock.en-US".into(),
                name: "Mock".into(),
                language: "en-US".into(),
                enhanced: false,
            }])
        })
    }
}

/// Generator with a fixed outcome and latency
pub struct ScriptedGenerator {
    log: CallLog,
    outcome: Result<String>,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn replying(log: CallLog, reply: &str) -> Self {
        Self {
            log,
            outcome: Ok(reply.to_string()),
            delay: Duration::from_millis(500),
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            log,
            outcome: Err(MurmurError::GenerationFailed("model offline".into())),
            delay: Duration::from_millis(500),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ResponseGenerator for ScriptedGenerator {
    fn generate<'a>(&'a self, input: &'a str, _kind: InputKind) -> BoxFuture<'a, Result<String>> {
        self.log.push(format!("generate:{}", input));
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        })
    }
}

pub const REPLY: &str = "Sure, I can help with that.";

/// Session wired to mocks
pub struct Harness {
    pub session: VoiceSession,
    pub events: crossbeam_channel::Receiver<VoiceEvent>,
    pub log: CallLog,
    pub capture: Arc<MockCaptureDevice>,
    pub speech: Arc<MockSpeechEngine>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self::build(
            MockCaptureDevice::granted(log.clone()),
            ScriptedGenerator::replying(log.clone(), REPLY),
            test_config(),
            log,
        )
    }

    pub fn build(
        capture: MockCaptureDevice,
        generator: ScriptedGenerator,
        config: VoiceConfig,
        log: CallLog,
    ) -> Self {
        let capture = Arc::new(capture);
        let speech = Arc::new(MockSpeechEngine::new(log.clone()));
        let components = SessionComponents {
            capture: capture.clone(),
            audio_mode: Arc::new(MockAudioMode::new(log.clone())),
            generator: Arc::new(generator),
            speech: speech.clone(),
        };
        let (events, rx) = murmur::events::EventSink::channel(config.event_capacity);
        let session = VoiceSession::new(&config, components, events);

        Self {
            session,
            events: rx,
            log,
            capture,
            speech,
        }
    }

    /// Record for `secs` seconds and wait until the reply is being spoken
    pub async fn speak_a_turn(&mut self, secs: u64) {
        self.session.start_listening().await;
        tokio::time::sleep(Duration::from_millis(secs * 1000 + 500)).await;
        self.session.stop_listening().await;
        assert_eq!(self.session.state(), VoiceSessionState::Speaking);
    }

    /// Apply the next pending speech callback
    pub async fn pump_speech(&mut self) {
        let callback = self
            .session
            .next_speech_callback()
            .await
            .expect("speech channel closed");
        self.session.on_speech_callback(callback).await;
    }

    pub fn drain_events(&self) -> Vec<VoiceEvent> {
        self.events.try_iter().collect()
    }
}

/// States entered, in order, according to the drained events
pub fn state_trail(events: &[VoiceEvent]) -> Vec<VoiceSessionState> {
    events
        .iter()
        .filter_map(|e| match e {
            VoiceEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

/// Default timings, with the real microphone disabled
pub fn test_config() -> VoiceConfig {
    VoiceConfig::new()
        .without_audio_input()
        .with_settle(SettleConfig::default())
        .with_output_dir(std::env::temp_dir().join("murmur-integration-tests"))
}
