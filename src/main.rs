use anyhow::Result;
use murmur::events::VoiceEvent;
use murmur::integration::{OrchestratorBuilder, OrchestratorCommand, VoiceConfig};
use murmur::session::VoiceSessionState;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => VoiceConfig::from_json_file(path)?,
        None => VoiceConfig::default(),
    };

    info!("Starting Murmur voice session demo");

    let (orchestrator, handle) = OrchestratorBuilder::new().with_config(config).build()?;
    let task = orchestrator.spawn();

    handle.start_listening()?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.stop_listening()?;

    // Print events until the turn comes back around to idle
    let events = handle.event_receiver();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    let mut finished = false;
    while !finished && tokio::time::Instant::now() < deadline {
        while let Ok(event) = events.try_recv() {
            match &event {
                VoiceEvent::StateChanged { to, .. } => {
                    println!("state: {}", to);
                    finished |= *to == VoiceSessionState::Idle;
                }
                VoiceEvent::DurationTick { seconds, .. } => println!("recording: {}s", seconds),
                VoiceEvent::TranscriptReady(text) => println!("you: {}", text),
                VoiceEvent::ReplyReady(text) => println!("assistant: {}", text),
                VoiceEvent::SpeechStarted => println!("(speaking)"),
                VoiceEvent::Alert(alert) => println!("alert: {}: {}", alert.title, alert.message),
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    handle.send_command(OrchestratorCommand::Shutdown)?;
    task.await?;

    info!("Demo finished");
    Ok(())
}
