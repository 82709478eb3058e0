//! Integration layer: configuration and the task that drives a voice session

pub mod config;
pub mod orchestrator;

pub use config::VoiceConfig;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorCommand, OrchestratorHandle};
