//! Voice session: the state machine tying recorder, reply generation and speech together

pub mod machine;
pub mod state;

pub use machine::{SessionComponents, VoiceSession};
pub use state::{voice_transcript, SessionSnapshot, VoiceSessionState, VoiceTurn};
