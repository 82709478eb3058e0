//! Orchestrator that runs a voice session on its own task
//!
//! The UI sends [`OrchestratorCommand`]s through an [`OrchestratorHandle`], drains
//! [`VoiceEvent`]s from it, and renders from the published [`SessionSnapshot`].

use crate::audio::mode::{AudioModeApi, DesktopAudioMode};
use crate::audio::recorder::CaptureDevice;
use crate::audio::simulated::SimulatedCaptureDevice;
use crate::events::{EventSink, VoiceEvent};
use crate::integration::config::VoiceConfig;
use crate::llm::{KeywordResponder, ResponseGenerator};
use crate::session::{SessionComponents, SessionSnapshot, VoiceSession};
use crate::speech::{SimulatedSpeechEngine, SpeechCallback, SpeechEngine};
use crate::{MurmurError, Result};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Commands that can be sent to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorCommand {
    /// Start recording voice input
    StartListening,

    /// Stop recording and answer it
    StopListening,

    /// Stop reading the reply aloud
    StopSpeech,

    /// Abort the current turn
    Cancel,

    /// Prompt for microphone access again
    RetryPermission,

    /// Tear the session down and stop the task
    Shutdown,
}

/// Handle for controlling the orchestrator from the UI
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: UnboundedSender<OrchestratorCommand>,
    event_rx: Receiver<VoiceEvent>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
}

impl OrchestratorHandle {
    /// Send a command to the orchestrator
    pub fn send_command(&self, cmd: OrchestratorCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| MurmurError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn start_listening(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::StartListening)
    }

    pub fn stop_listening(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::StopListening)
    }

    pub fn stop_speech(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::StopSpeech)
    }

    pub fn cancel_voice_chat(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::Cancel)
    }

    /// Try to receive an event from the orchestrator
    pub fn try_recv_event(&self) -> Option<VoiceEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get the event receiver
    pub fn event_receiver(&self) -> Receiver<VoiceEvent> {
        self.event_rx.clone()
    }

    /// Latest published session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }
}

enum Step {
    Command(Option<OrchestratorCommand>),
    Speech(SpeechCallback),
    Refresh,
}

/// Owns the session and applies commands and speech callbacks in order
pub struct Orchestrator {
    session: VoiceSession,
    command_rx: UnboundedReceiver<OrchestratorCommand>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    /// How often the snapshot is republished while recording
    refresh_period: Duration,
}

impl Orchestrator {
    /// Create a new orchestrator with the given configuration
    pub fn new(
        config: VoiceConfig,
        components: SessionComponents,
    ) -> Result<(Self, OrchestratorHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = unbounded_channel();
        let (events, event_rx) = EventSink::channel(config.event_capacity);
        let session = VoiceSession::new(&config, components, events);
        let snapshot = Arc::new(RwLock::new(session.snapshot()));
        let refresh_period = (config.recorder.tick_interval() / 4).max(Duration::from_millis(10));

        let handle = OrchestratorHandle {
            command_tx,
            event_rx,
            snapshot: Arc::clone(&snapshot),
        };

        Ok((
            Self {
                session,
                command_rx,
                snapshot,
                refresh_period,
            },
            handle,
        ))
    }

    /// Run on a new tokio task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands and speech callbacks until shutdown
    pub async fn run(mut self) {
        info!("Orchestrator started");

        // Keeps the published recording duration current between commands
        let mut refresh = tokio::time::interval(self.refresh_period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.publish();

            let recording = self.session.is_recording();
            let step = tokio::select! {
                cmd = self.command_rx.recv() => Step::Command(cmd),
                Some(callback) = self.session.next_speech_callback() => Step::Speech(callback),
                _ = refresh.tick(), if recording => Step::Refresh,
            };

            match step {
                Step::Refresh => {}
                Step::Speech(callback) => self.session.on_speech_callback(callback).await,
                Step::Command(None) => {
                    debug!("All handles dropped");
                    break;
                }
                Step::Command(Some(OrchestratorCommand::Shutdown)) => {
                    info!("Orchestrator shutdown requested");
                    break;
                }
                Step::Command(Some(cmd)) => {
                    if !self.dispatch(cmd).await {
                        break;
                    }
                }
            }
        }

        self.session.close().await;
        self.publish();
        info!("Orchestrator stopped");
    }

    /// Returns false when the orchestrator should stop
    async fn dispatch(&mut self, cmd: OrchestratorCommand) -> bool {
        debug!("Command: {:?}", cmd);
        match cmd {
            OrchestratorCommand::StartListening => self.session.start_listening().await,
            OrchestratorCommand::StopListening => return self.stop_listening().await,
            OrchestratorCommand::StopSpeech => self.session.stop_speech().await,
            OrchestratorCommand::Cancel => self.session.cancel().await,
            OrchestratorCommand::RetryPermission => {
                let status = self.session.retry_permission().await;
                info!("Microphone permission after retry: {:?}", status);
            }
            OrchestratorCommand::Shutdown => return false,
        }
        true
    }

    /// Finish the recording, then race reply generation against cancel
    ///
    /// Recorder finalization is never interrupted; only the processing step is.
    async fn stop_listening(&mut self) -> bool {
        if !self.session.end_capture().await {
            return true;
        }
        self.publish();

        let interrupt = {
            let respond = self.session.respond_to_turn();
            tokio::pin!(respond);

            loop {
                tokio::select! {
                    _ = &mut respond => break None,
                    cmd = self.command_rx.recv() => match cmd {
                        Some(OrchestratorCommand::Cancel) => {
                            break Some(OrchestratorCommand::Cancel)
                        }
                        Some(OrchestratorCommand::Shutdown) | None => {
                            break Some(OrchestratorCommand::Shutdown)
                        }
                        Some(other) => debug!("Ignoring {:?} while processing", other),
                    },
                }
            }
        };

        match interrupt {
            None => true,
            Some(OrchestratorCommand::Cancel) => {
                self.session.cancel().await;
                true
            }
            Some(_) => false,
        }
    }

    fn publish(&self) {
        *self.snapshot.write() = self.session.snapshot();
    }
}

/// Builder for creating an orchestrator
///
/// Collaborators that are not set fall back to the bundled implementations.
pub struct OrchestratorBuilder {
    config: VoiceConfig,
    capture: Option<Arc<dyn CaptureDevice>>,
    audio_mode: Option<Arc<dyn AudioModeApi>>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    speech: Option<Arc<dyn SpeechEngine>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: VoiceConfig::default(),
            capture: None,
            audio_mode: None,
            generator: None,
            speech: None,
        }
    }

    /// Set the complete configuration
    pub fn with_config(mut self, config: VoiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureDevice>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_audio_mode(mut self, audio_mode: Arc<dyn AudioModeApi>) -> Self {
        self.audio_mode = Some(audio_mode);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechEngine>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<(Orchestrator, OrchestratorHandle)> {
        let capture = match self.capture {
            Some(capture) => capture,
            None => default_capture(&self.config),
        };
        let components = SessionComponents {
            capture,
            audio_mode: self
                .audio_mode
                .unwrap_or_else(|| Arc::new(DesktopAudioMode)),
            generator: self
                .generator
                .unwrap_or_else(|| Arc::new(KeywordResponder::new(self.config.generation.clone()))),
            speech: self
                .speech
                .unwrap_or_else(|| Arc::new(SimulatedSpeechEngine::new())),
        };
        Orchestrator::new(self.config, components)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "audio-io")]
fn default_capture(config: &VoiceConfig) -> Arc<dyn CaptureDevice> {
    use crate::audio::input::CpalCaptureDevice;

    if config.enable_audio_input {
        match CpalCaptureDevice::new(&config.recorder.output_dir) {
            Ok(device) => {
                info!("Using the default microphone");
                return Arc::new(device);
            }
            Err(e) => info!("Microphone unavailable ({}), using simulated input", e),
        }
    }
    simulated_capture(config)
}

#[cfg(not(feature = "audio-io"))]
fn default_capture(config: &VoiceConfig) -> Arc<dyn CaptureDevice> {
    simulated_capture(config)
}

fn simulated_capture(config: &VoiceConfig) -> Arc<dyn CaptureDevice> {
    Arc::new(SimulatedCaptureDevice::granted().with_output_dir(&config.recorder.output_dir))
}
