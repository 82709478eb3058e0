//! Orchestrator tests
//!
//! Drive the session through the command handle, the way a UI would.

mod common;

use common::{
    test_config, CallLog, MockAudioMode, MockCaptureDevice, MockSpeechEngine, ScriptedGenerator,
};
use murmur::events::VoiceEvent;
use murmur::integration::{OrchestratorBuilder, OrchestratorCommand, OrchestratorHandle};
use murmur::session::VoiceSessionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Running {
    handle: OrchestratorHandle,
    task: JoinHandle<()>,
    log: CallLog,
    speech: Arc<MockSpeechEngine>,
}

fn spawn_with(generator: impl FnOnce(CallLog) -> ScriptedGenerator) -> Running {
    let log = CallLog::default();
    let speech = Arc::new(MockSpeechEngine::new(log.clone()));
    let (orchestrator, handle) = OrchestratorBuilder::new()
        .with_config(test_config())
        .with_capture(Arc::new(MockCaptureDevice::granted(log.clone())))
        .with_audio_mode(Arc::new(MockAudioMode::new(log.clone())))
        .with_generator(Arc::new(generator(log.clone())))
        .with_speech(speech.clone())
        .build()
        .unwrap();

    Running {
        handle,
        task: orchestrator.spawn(),
        log,
        speech,
    }
}

async fn wait_for(handle: &OrchestratorHandle, state: VoiceSessionState) {
    for _ in 0..1000 {
        if handle.snapshot().state == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "session never reached {}, stuck in {}",
        state,
        handle.snapshot().state
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_turn_through_handle() {
    let run = spawn_with(|log| ScriptedGenerator::replying(log, common::REPLY));

    run.handle.start_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Listening).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(run.handle.snapshot().is_recording);

    run.handle.stop_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Speaking).await;

    let snapshot = run.handle.snapshot();
    assert_eq!(snapshot.transcript, "Voice message (2 seconds)");
    assert_eq!(snapshot.ai_response, common::REPLY);

    run.speech.finish();
    wait_for(&run.handle, VoiceSessionState::Idle).await;
    assert!(run.handle.snapshot().ai_response.is_empty());

    let events: Vec<VoiceEvent> = run.handle.event_receiver().try_iter().collect();
    let states: Vec<VoiceSessionState> = events
        .iter()
        .filter_map(|e| match e {
            VoiceEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    let last_tick = events.iter().rev().find_map(|e| match e {
        VoiceEvent::DurationTick { seconds, .. } => Some(*seconds),
        _ => None,
    });
    assert_eq!(last_tick, Some(2));
    assert_eq!(
        states,
        vec![
            VoiceSessionState::Listening,
            VoiceSessionState::Processing,
            VoiceSessionState::Speaking,
            VoiceSessionState::Idle,
        ]
    );

    run.handle.send_command(OrchestratorCommand::Shutdown).unwrap();
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_duration_follows_recording() {
    let run = spawn_with(|log| ScriptedGenerator::replying(log, common::REPLY));

    run.handle.start_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Listening).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let snapshot = run.handle.snapshot();
    assert_eq!(snapshot.state, VoiceSessionState::Listening);
    assert!(snapshot.is_recording);
    assert_eq!(snapshot.recording_duration, 2);

    run.handle.cancel_voice_chat().unwrap();
    wait_for(&run.handle, VoiceSessionState::Idle).await;
    assert_eq!(run.handle.snapshot().recording_duration, 0);

    run.handle.send_command(OrchestratorCommand::Shutdown).unwrap();
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_processing_skips_reply() {
    let run = spawn_with(|log| {
        ScriptedGenerator::replying(log, common::REPLY).with_delay(Duration::from_secs(10))
    });

    run.handle.start_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Listening).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    run.handle.stop_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Processing).await;

    run.handle.cancel_voice_chat().unwrap();
    wait_for(&run.handle, VoiceSessionState::Idle).await;

    // Let the abandoned generation deadline pass
    tokio::time::sleep(Duration::from_secs(15)).await;

    let snapshot = run.handle.snapshot();
    assert_eq!(snapshot.state, VoiceSessionState::Idle);
    assert!(snapshot.transcript.is_empty());
    assert!(snapshot.ai_response.is_empty());
    assert!(run.log.contains("capture.finalize"));
    assert!(run.log.position("speak:").is_none());
    assert!(!run
        .handle
        .event_receiver()
        .try_iter()
        .any(|e| matches!(e, VoiceEvent::ReplyReady(_))));

    run.handle.send_command(OrchestratorCommand::Shutdown).unwrap();
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_speech_command() {
    let run = spawn_with(|log| ScriptedGenerator::replying(log, common::REPLY));

    run.handle.start_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Listening).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    run.handle.stop_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Speaking).await;

    run.handle.stop_speech().unwrap();
    wait_for(&run.handle, VoiceSessionState::Idle).await;
    assert!(run.log.contains("speech.stop"));

    run.handle.send_command(OrchestratorCommand::Shutdown).unwrap();
    run.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_speaking_releases_everything() {
    let run = spawn_with(|log| ScriptedGenerator::replying(log, common::REPLY));

    run.handle.start_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Listening).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    run.handle.stop_listening().unwrap();
    wait_for(&run.handle, VoiceSessionState::Speaking).await;

    run.handle.send_command(OrchestratorCommand::Shutdown).unwrap();
    run.task.await.unwrap();

    assert!(run.log.contains("speech.stop"));
    assert_eq!(run.handle.snapshot().state, VoiceSessionState::Idle);
    assert!(run.handle.start_listening().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_orchestrator() {
    let run = spawn_with(|log| ScriptedGenerator::replying(log, common::REPLY));
    let Running { handle, task, .. } = run;

    drop(handle);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("orchestrator kept running")
        .unwrap();
}
