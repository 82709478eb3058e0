//! Voice session state and per-turn data

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a voice turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceSessionState {
    /// Waiting for the user
    #[default]
    Idle,
    /// Capturing the microphone
    Listening,
    /// Recording finished, producing a reply
    Processing,
    /// Reading the reply aloud
    Speaking,
}

impl VoiceSessionState {
    /// Whether the session may move from `self` to `to`
    ///
    /// Every non-idle state may always fall back to idle (cancel, failure).
    pub fn can_transition_to(self, to: VoiceSessionState) -> bool {
        use VoiceSessionState::*;
        matches!(
            (self, to),
            (Idle, Listening)
                | (Listening, Processing)
                | (Processing, Speaking)
                | (Listening | Processing | Speaking, Idle)
        )
    }

    pub fn is_idle(self) -> bool {
        self == VoiceSessionState::Idle
    }
}

impl fmt::Display for VoiceSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceSessionState::Idle => "idle",
            VoiceSessionState::Listening => "listening",
            VoiceSessionState::Processing => "processing",
            VoiceSessionState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Transient data of the current turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTurn {
    pub transcript: String,
    pub reply_text: String,
}

impl VoiceTurn {
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.reply_text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty() && self.reply_text.is_empty()
    }
}

/// What the UI renders from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: VoiceSessionState,
    pub transcript: String,
    pub ai_response: String,
    pub recording_duration: u32,
    pub is_recording: bool,
}

/// Placeholder transcript for a voice clip; there is no speech recognition
pub fn voice_transcript(duration_secs: u32) -> String {
    match duration_secs {
        0 => "Voice message (under a second)".to_string(),
        1 => "Voice message (1 second)".to_string(),
        n => format!("Voice message ({} seconds)", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoiceSessionState::*;

    #[test]
    fn test_transition_table() {
        assert!(Idle.can_transition_to(Listening));
        assert!(Listening.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Speaking));
        assert!(Speaking.can_transition_to(Idle));
        assert!(Processing.can_transition_to(Idle));
        assert!(Listening.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(Speaking));
        assert!(!Idle.can_transition_to(Processing));
        assert!(!Listening.can_transition_to(Speaking));
        assert!(!Speaking.can_transition_to(Listening));
        assert!(!Idle.can_transition_to(Idle));
    }

    #[test]
    fn test_turn_clear() {
        let mut turn = VoiceTurn {
            transcript: "hi".into(),
            reply_text: "hello".into(),
        };
        assert!(!turn.is_empty());
        turn.clear();
        assert!(turn.is_empty());
    }

    #[test]
    fn test_voice_transcript() {
        assert_eq!(voice_transcript(1), "Voice message (1 second)");
        assert_eq!(voice_transcript(3), "Voice message (3 seconds)");
    }

    #[test]
    fn test_snapshot_serializes_lowercase_state() {
        let snapshot = SessionSnapshot {
            state: Speaking,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"state\":\"speaking\""));
    }
}
