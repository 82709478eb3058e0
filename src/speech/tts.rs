//! Text-to-speech engine boundary
//!
//! Engines report progress through callbacks. Each callback is delivered as a
//! [`SpeechCallback`] message tagged with the [`UtteranceId`] it belongs to, so the
//! session can drop callbacks from an utterance it already stopped.

use crate::{MurmurError, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

/// Voice parameters for one utterance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    /// BCP-47 language tag, e.g. `en-US`
    pub language: String,

    /// 1.0 = normal pitch
    pub pitch: f32,

    /// 1.0 = normal speed
    pub rate: f32,

    /// 0.0 to 1.0
    pub volume: f32,

    /// Engine voice id; resolved from the language when unset
    pub voice: Option<String>,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            pitch: 1.0,
            rate: 0.9,
            volume: 1.0,
            voice: None,
        }
    }
}

impl SpeechOptions {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(MurmurError::ConfigError("speech language is required".into()));
        }
        if !(self.rate > 0.0 && self.rate <= 4.0) {
            return Err(MurmurError::ConfigError(format!(
                "speech rate {} outside (0, 4]",
                self.rate
            )));
        }
        if !(0.5..=2.0).contains(&self.pitch) {
            return Err(MurmurError::ConfigError(format!(
                "speech pitch {} outside [0.5, 2]",
                self.pitch
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(MurmurError::ConfigError(format!(
                "speech volume {} outside [0, 1]",
                self.volume
            )));
        }
        Ok(())
    }
}

/// A voice offered by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    /// Engines usually ship a default and an enhanced variant per language
    pub enhanced: bool,
}

/// Pick the best voice for a language tag
///
/// Exact tag matches win over same-language matches, and enhanced voices win ties.
pub fn select_voice<'a>(voices: &'a [Voice], language: &str) -> Option<&'a Voice> {
    let primary = language.split(['-', '_']).next().unwrap_or(language);
    voices
        .iter()
        .filter_map(|voice| {
            let exact = voice.language.eq_ignore_ascii_case(language);
            let same_language = voice
                .language
                .split(['-', '_'])
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case(primary));
            match (exact, same_language) {
                (true, _) => Some((2, voice)),
                (false, true) => Some((1, voice)),
                _ => None,
            }
        })
        .max_by_key(|(score, voice)| (*score, voice.enhanced))
        .map(|(_, voice)| voice)
}

/// Identifies one `speak` call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UtteranceId(Uuid);

impl UtteranceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UtteranceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpeechCallbackKind {
    Started,
    Done,
    Stopped,
    Error(String),
}

impl SpeechCallbackKind {
    /// Whether the utterance is over
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpeechCallbackKind::Started)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeechCallback {
    pub utterance: UtteranceId,
    pub kind: SpeechCallbackKind,
}

/// The callback set handed to an engine for one utterance
#[derive(Clone, Debug)]
pub struct SpeechCallbacks {
    utterance: UtteranceId,
    tx: UnboundedSender<SpeechCallback>,
}

impl SpeechCallbacks {
    pub fn new(utterance: UtteranceId, tx: UnboundedSender<SpeechCallback>) -> Self {
        Self { utterance, tx }
    }

    pub fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    pub fn on_start(&self) {
        self.send(SpeechCallbackKind::Started);
    }

    pub fn on_done(&self) {
        self.send(SpeechCallbackKind::Done);
    }

    pub fn on_stopped(&self) {
        self.send(SpeechCallbackKind::Stopped);
    }

    pub fn on_error(&self, error: impl Into<String>) {
        self.send(SpeechCallbackKind::Error(error.into()));
    }

    fn send(&self, kind: SpeechCallbackKind) {
        let callback = SpeechCallback {
            utterance: self.utterance,
            kind,
        };
        if self.tx.send(callback).is_err() {
            debug!("Speech callback for {} dropped, session gone", self.utterance);
        }
    }
}

/// Platform speech synthesizer
pub trait SpeechEngine: Send + Sync {
    /// Start speaking; completion is reported through `callbacks`
    fn speak<'a>(
        &'a self,
        text: &'a str,
        options: &'a SpeechOptions,
        callbacks: SpeechCallbacks,
    ) -> BoxFuture<'a, Result<()>>;

    /// Stop any speech in progress
    fn stop(&self) -> Result<()>;

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<Voice>>>;
}

/// Normalize reply text for speech synthesis
///
/// Strips markdown markup and emoji, and expands abbreviations, symbols and clock
/// times that engines tend to read out literally.
pub fn normalize_text_for_tts(text: &str) -> String {
    let mut result: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '~'))
        .collect();

    let abbreviations = [
        ("Mr.", "Mister"),
        ("Mrs.", "Misses"),
        ("Ms.", "Miss"),
        ("Dr.", "Doctor"),
        ("vs.", "versus"),
        ("etc.", "etcetera"),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
        ("approx.", "approximately"),
        ("mins.", "minutes"),
        ("hrs.", "hours"),
    ];
    for (abbrev, expansion) in abbreviations {
        result = result.replace(abbrev, expansion);
    }

    let symbols = [
        ("&", " and "),
        ("%", " percent"),
        ("@", " at "),
        ("+", " plus "),
        ("=", " equals "),
        ("°", " degrees"),
    ];
    for (symbol, word) in symbols {
        result = result.replace(symbol, word);
    }

    result = expand_clock_times(&result);

    // Headings and bullets become plain sentences
    result = result
        .lines()
        .map(|line| line.trim_start_matches(['#', '-', '>']).trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    result = result
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"".contains(*c))
        .collect();

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "3:30" -> "three thirty", "9:00" -> "nine o'clock"
fn expand_clock_times(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            result.push(c);
            continue;
        }

        let mut hours = String::from(c);
        while let Some(&next) = chars.peek().filter(|n| n.is_ascii_digit()) {
            hours.push(next);
            chars.next();
        }

        if chars.peek() != Some(&':') {
            result.push_str(&hours);
            continue;
        }
        chars.next();

        let mut minutes = String::new();
        while let Some(&next) = chars.peek().filter(|n| n.is_ascii_digit()) {
            if minutes.len() == 2 {
                break;
            }
            minutes.push(next);
            chars.next();
        }

        match (hours.parse::<u32>(), minutes.parse::<u32>()) {
            (Ok(h), Ok(0)) if minutes.len() == 2 && h <= 24 => {
                result.push_str(&format!("{} o'clock", number_to_words(h)));
            }
            (Ok(h), Ok(m)) if minutes.len() == 2 && h <= 24 && m < 60 => {
                let minutes_words = if m < 10 {
                    format!("oh {}", number_to_words(m))
                } else {
                    number_to_words(m)
                };
                result.push_str(&format!("{} {}", number_to_words(h), minutes_words));
            }
            _ => {
                result.push_str(&hours);
                result.push(':');
                result.push_str(&minutes);
            }
        }
    }

    result
}

fn number_to_words(num: u32) -> String {
    const ONES: [&str; 20] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
    ];

    match num {
        0..=19 => ONES[num as usize].to_string(),
        20..=99 if num % 10 == 0 => TENS[(num / 10) as usize].to_string(),
        20..=99 => format!("{}-{}", TENS[(num / 10) as usize], ONES[(num % 10) as usize]),
        _ => num.to_string(),
    }
}
