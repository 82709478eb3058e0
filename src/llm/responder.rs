use crate::llm::config::GenerationConfig;
use crate::llm::responses::{FALLBACK, KEYWORDS, TIME, VOICE_REPLIES};
use crate::{MurmurError, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// How the user's input arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Audio,
}

/// Maps conversation input to reply text
///
/// One request at a time per turn; no retries at this level.
pub trait ResponseGenerator: Send + Sync {
    fn generate<'a>(&'a self, input: &'a str, kind: InputKind) -> BoxFuture<'a, Result<String>>;
}

/// Scripted responder: keyword matches for text, a rotating set of replies for voice
pub struct KeywordResponder {
    config: GenerationConfig,
    next_voice_reply: AtomicUsize,
}

impl KeywordResponder {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            next_voice_reply: AtomicUsize::new(0),
        }
    }

    /// The reply for an input, without the simulated latency
    pub fn reply_for(&self, input: &str, kind: InputKind) -> Result<String> {
        match kind {
            InputKind::Audio => {
                let index = self.next_voice_reply.fetch_add(1, Ordering::Relaxed);
                Ok(VOICE_REPLIES[index % VOICE_REPLIES.len()].to_string())
            }
            InputKind::Text => {
                let input = input.trim();
                if input.is_empty() {
                    return Err(MurmurError::GenerationFailed("empty input".into()));
                }
                Ok(keyword_reply(input))
            }
        }
    }
}

fn keyword_reply(input: &str) -> String {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let matched = KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| words.contains(k)))
        .map(|(_, reply)| *reply);

    match matched {
        Some(reply) if reply == TIME => {
            let now = chrono::Local::now().format("%-I:%M %p").to_string();
            reply.replace("{time}", &now)
        }
        Some(reply) => reply.to_string(),
        None => FALLBACK.replace("{input}", input),
    }
}

impl ResponseGenerator for KeywordResponder {
    fn generate<'a>(&'a self, input: &'a str, kind: InputKind) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let latency = self.config.latency_for(input);
            debug!("Generating {:?} reply in {:?}", kind, latency);
            tokio::time::sleep(latency).await;
            self.reply_for(input, kind)
        })
    }
}
