//! Speech engine that pretends to talk
//!
//! Speaking time is derived from the word count and the requested rate, so the
//! session sees the same callback sequence a platform engine would produce.

use crate::speech::tts::{SpeechCallbacks, SpeechEngine, SpeechOptions, Voice};
use crate::Result;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Speaking pace at rate 1.0
pub const DEFAULT_WORDS_PER_MINUTE: f32 = 170.0;

struct Playing {
    callbacks: SpeechCallbacks,
    task: JoinHandle<()>,
}

pub struct SimulatedSpeechEngine {
    words_per_minute: f32,
    voices: Vec<Voice>,
    current: Mutex<Option<Playing>>,
}

impl SimulatedSpeechEngine {
    pub fn new() -> Self {
        Self {
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            voices: vec![
                Voice {
                    id: "sim.en-US.default".to_string(),
                    name: "Sam".to_string(),
                    language: "en-US".to_string(),
                    enhanced: false,
                },
                Voice {
                    id: "sim.en-US.enhanced".to_string(),
                    name: "Sam (Enhanced)".to_string(),
                    language: "en-US".to_string(),
                    enhanced: true,
                },
                Voice {
                    id: "sim.en-GB.default".to_string(),
                    name: "Alex".to_string(),
                    language: "en-GB".to_string(),
                    enhanced: false,
                },
            ],
            current: Mutex::new(None),
        }
    }

    pub fn with_words_per_minute(mut self, words_per_minute: f32) -> Self {
        self.words_per_minute = words_per_minute.max(1.0);
        self
    }

    /// How long `text` takes to say at `rate`
    pub fn speaking_time(&self, text: &str, rate: f32) -> Duration {
        let words = text.split_whitespace().count().max(1) as f32;
        Duration::from_secs_f32(words * 60.0 / (self.words_per_minute * rate.max(0.1)))
    }

    fn interrupt(&self) {
        if let Some(playing) = self.current.lock().take() {
            if !playing.task.is_finished() {
                playing.task.abort();
                playing.callbacks.on_stopped();
                debug!("Interrupted utterance {}", playing.callbacks.utterance());
            }
        }
    }
}

impl Default for SimulatedSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechEngine for SimulatedSpeechEngine {
    fn speak<'a>(
        &'a self,
        text: &'a str,
        options: &'a SpeechOptions,
        callbacks: SpeechCallbacks,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.interrupt();

            let duration = self.speaking_time(text, options.rate);
            debug!(
                "Speaking {} words in {:?} ({})",
                text.split_whitespace().count(),
                duration,
                options.language
            );

            let task_callbacks = callbacks.clone();
            let task = tokio::spawn(async move {
                task_callbacks.on_start();
                tokio::time::sleep(duration).await;
                task_callbacks.on_done();
            });

            *self.current.lock() = Some(Playing { callbacks, task });
            Ok(())
        })
    }

    fn stop(&self) -> Result<()> {
        self.interrupt();
        Ok(())
    }

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<Voice>>> {
        let voices = self.voices.clone();
        Box::pin(async move { Ok(voices) })
    }
}
