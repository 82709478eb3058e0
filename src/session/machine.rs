//! The voice session state machine
//!
//! Drives one turn at a time through idle → listening → processing → speaking →
//! idle. Recording and playback never overlap: a turn only reaches `Speaking` after
//! the audio mode has settled back to neutral.

use crate::audio::mode::{AudioModeApi, AudioModeCoordinator};
use crate::audio::recorder::{AudioRecorder, CaptureDevice, PermissionStatus};
use crate::events::{Alert, EventSink, VoiceEvent};
use crate::integration::config::VoiceConfig;
use crate::llm::{InputKind, ResponseGenerator};
use crate::session::state::{voice_transcript, SessionSnapshot, VoiceSessionState, VoiceTurn};
use crate::speech::tts::{
    normalize_text_for_tts, select_voice, SpeechCallback, SpeechCallbackKind, SpeechCallbacks,
    SpeechEngine, SpeechOptions, UtteranceId,
};
use crate::MurmurError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Platform collaborators the session drives
pub struct SessionComponents {
    pub capture: Arc<dyn CaptureDevice>,
    pub audio_mode: Arc<dyn AudioModeApi>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub speech: Arc<dyn SpeechEngine>,
}

pub struct VoiceSession {
    recorder: AudioRecorder,
    modes: Arc<AudioModeCoordinator>,
    generator: Arc<dyn ResponseGenerator>,
    speech: Arc<dyn SpeechEngine>,
    speech_options: SpeechOptions,
    voice_resolved: bool,
    generation_timeout: Duration,
    events: EventSink,

    state: VoiceSessionState,
    turn: VoiceTurn,
    /// The utterance whose callbacks are still honored
    utterance: Option<UtteranceId>,

    speech_tx: UnboundedSender<SpeechCallback>,
    speech_rx: UnboundedReceiver<SpeechCallback>,
}

impl VoiceSession {
    pub fn new(config: &VoiceConfig, components: SessionComponents, events: EventSink) -> Self {
        let modes = Arc::new(AudioModeCoordinator::new(
            components.audio_mode,
            config.settle.clone(),
        ));
        let recorder = AudioRecorder::new(
            components.capture,
            Arc::clone(&modes),
            events.clone(),
            config.recorder.clone(),
        );
        let (speech_tx, speech_rx) = unbounded_channel();

        Self {
            recorder,
            modes,
            generator: components.generator,
            speech: components.speech,
            speech_options: config.speech.clone(),
            voice_resolved: false,
            generation_timeout: config.generation.timeout(),
            events,
            state: VoiceSessionState::Idle,
            turn: VoiceTurn::default(),
            utterance: None,
            speech_tx,
            speech_rx,
        }
    }

    pub fn state(&self) -> VoiceSessionState {
        self.state
    }

    pub fn transcript(&self) -> &str {
        &self.turn.transcript
    }

    pub fn ai_response(&self) -> &str {
        &self.turn.reply_text
    }

    pub fn recording_duration(&self) -> u32 {
        self.recorder.duration_secs()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn audio_modes(&self) -> &Arc<AudioModeCoordinator> {
        &self.modes
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            transcript: self.turn.transcript.clone(),
            ai_response: self.turn.reply_text.clone(),
            recording_duration: self.recorder.duration_secs(),
            is_recording: self.recorder.is_recording(),
        }
    }

    /// Prompt for microphone access again, e.g. from a permission alert
    pub async fn retry_permission(&self) -> PermissionStatus {
        self.recorder.request_permission().await
    }

    /// User pressed talk
    pub async fn start_listening(&mut self) {
        if !self.state.is_idle() {
            warn!("start_listening ignored while {}", self.state);
            return;
        }

        self.turn.clear();
        self.transition(VoiceSessionState::Listening);

        if let Err(e) = self.recorder.start().await {
            // The recorder already alerted the user
            warn!("Could not start listening: {}", e);
            self.recorder.cancel().await;
            self.transition(VoiceSessionState::Idle);
        }
    }

    /// User released talk: finish the recording and answer it
    pub async fn stop_listening(&mut self) {
        if self.end_capture().await {
            self.respond_to_turn().await;
        }
    }

    /// Close the recording and move to `Processing`
    ///
    /// Returns whether a recording was produced and the turn continues.
    pub(crate) async fn end_capture(&mut self) -> bool {
        if self.state != VoiceSessionState::Listening {
            debug!("stop_listening ignored while {}", self.state);
            return false;
        }

        self.transition(VoiceSessionState::Processing);

        match self.recorder.stop().await {
            Some(recording) => {
                info!(
                    "Captured {}s of audio at {}",
                    recording.duration_secs, recording.uri
                );
                self.turn.transcript = voice_transcript(recording.duration_secs);
                self.events
                    .emit(VoiceEvent::TranscriptReady(self.turn.transcript.clone()));
                true
            }
            None => {
                self.turn.clear();
                self.transition(VoiceSessionState::Idle);
                false
            }
        }
    }

    /// Generate the reply, settle the audio mode, and start speaking
    pub(crate) async fn respond_to_turn(&mut self) {
        if self.state != VoiceSessionState::Processing {
            return;
        }

        let generator = Arc::clone(&self.generator);
        let input = self.turn.transcript.clone();
        let outcome = tokio::time::timeout(
            self.generation_timeout,
            generator.generate(&input, InputKind::Audio),
        )
        .await;

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return self.generation_failed(e),
            Err(_) => {
                return self.generation_failed(MurmurError::GenerationFailed(format!(
                    "timed out after {:?}",
                    self.generation_timeout
                )))
            }
        };

        self.turn.reply_text = reply.clone();
        self.events.emit(VoiceEvent::ReplyReady(reply));

        if let Err(e) = self.modes.settle_to_neutral().await {
            return self.playback_failed(e).await;
        }

        self.begin_speaking().await;
    }

    /// User asked to stop the reply
    pub async fn stop_speech(&mut self) {
        if self.state != VoiceSessionState::Speaking {
            debug!("stop_speech ignored while {}", self.state);
            return;
        }
        self.halt_speech();
        self.finish_speaking().await;
    }

    /// Abort the turn from any state and release every resource
    pub async fn cancel(&mut self) {
        let from = self.state;

        self.halt_speech();
        if let Err(e) = self.modes.leave_playback_mode().await {
            warn!("Leaving playback mode failed: {}", e);
        }
        self.recorder.cancel().await;
        self.turn.clear();

        if !from.is_idle() {
            self.transition(VoiceSessionState::Idle);
            info!("Voice turn cancelled from {}", from);
        }
    }

    /// Tear the session down; speech is stopped before anything else
    pub async fn close(&mut self) {
        self.halt_speech();
        self.cancel().await;
        info!("Voice session closed");
    }

    /// Wait for the next speech engine callback
    pub async fn next_speech_callback(&mut self) -> Option<SpeechCallback> {
        self.speech_rx.recv().await
    }

    /// Apply a speech engine callback
    ///
    /// Callbacks from an utterance that was stopped or replaced are ignored.
    pub async fn on_speech_callback(&mut self, callback: SpeechCallback) {
        if self.utterance != Some(callback.utterance) {
            debug!(
                "Ignoring stale {:?} for utterance {}",
                callback.kind, callback.utterance
            );
            return;
        }

        match callback.kind {
            SpeechCallbackKind::Started => {
                debug!("Speech started");
                self.events.emit(VoiceEvent::SpeechStarted);
            }
            SpeechCallbackKind::Done | SpeechCallbackKind::Stopped => {
                self.finish_speaking().await;
            }
            SpeechCallbackKind::Error(message) => {
                self.utterance = None;
                self.playback_failed(MurmurError::PlaybackFailed(message))
                    .await;
            }
        }
    }

    /// Pump speech callbacks until the session leaves `Speaking`
    pub async fn run_until_idle(&mut self) {
        while self.state == VoiceSessionState::Speaking {
            match self.speech_rx.recv().await {
                Some(callback) => self.on_speech_callback(callback).await,
                None => break,
            }
        }
    }

    async fn begin_speaking(&mut self) {
        self.resolve_voice().await;

        let text = normalize_text_for_tts(&self.turn.reply_text);
        if text.is_empty() {
            debug!("Reply has nothing to speak");
            self.turn.clear();
            self.transition(VoiceSessionState::Idle);
            return;
        }

        if let Err(e) = self.modes.enter_playback_mode().await {
            return self.playback_failed(e).await;
        }

        let utterance = UtteranceId::new();
        self.utterance = Some(utterance);
        self.transition(VoiceSessionState::Speaking);

        let speech = Arc::clone(&self.speech);
        let options = self.speech_options.clone();
        let callbacks = SpeechCallbacks::new(utterance, self.speech_tx.clone());
        if let Err(e) = speech.speak(&text, &options, callbacks).await {
            self.utterance = None;
            self.playback_failed(e).await;
        }
    }

    async fn resolve_voice(&mut self) {
        if self.voice_resolved || self.speech_options.voice.is_some() {
            return;
        }
        self.voice_resolved = true;

        match self.speech.list_voices().await {
            Ok(voices) => {
                if let Some(voice) = select_voice(&voices, &self.speech_options.language) {
                    info!("Using voice {} ({})", voice.name, voice.language);
                    self.speech_options.voice = Some(voice.id.clone());
                }
            }
            Err(e) => debug!("Voice list unavailable, using engine default: {}", e),
        }
    }

    fn halt_speech(&mut self) {
        if let Some(utterance) = self.utterance.take() {
            if let Err(e) = self.speech.stop() {
                warn!("Stopping speech failed: {}", e);
            }
            debug!("Speech for utterance {} halted", utterance);
        }
    }

    async fn finish_speaking(&mut self) {
        self.utterance = None;
        if let Err(e) = self.modes.leave_playback_mode().await {
            warn!("Leaving playback mode failed: {}", e);
        }
        self.turn.clear();
        self.transition(VoiceSessionState::Idle);
    }

    fn generation_failed(&mut self, error: MurmurError) {
        warn!("Reply generation failed: {}", error);
        self.turn.reply_text = error.user_message();
        self.events
            .emit(VoiceEvent::ReplyReady(self.turn.reply_text.clone()));
        self.transition(VoiceSessionState::Idle);
    }

    async fn playback_failed(&mut self, error: MurmurError) {
        let error = match error {
            MurmurError::PlaybackFailed(_) => error,
            other => MurmurError::PlaybackFailed(other.to_string()),
        };
        warn!("{}", error);
        self.events.alert(Alert::from_error("Voice reply", &error));

        if let Err(e) = self.modes.leave_playback_mode().await {
            warn!("Leaving playback mode failed: {}", e);
        }
        self.turn.clear();
        self.transition(VoiceSessionState::Idle);
    }

    fn transition(&mut self, to: VoiceSessionState) -> bool {
        if !self.state.can_transition_to(to) {
            warn!("Refusing transition {} -> {}", self.state, to);
            return false;
        }

        let from = std::mem::replace(&mut self.state, to);
        info!("Voice session: {} -> {}", from, to);
        self.events.emit(VoiceEvent::StateChanged { from, to });
        true
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.halt_speech();
    }
}
