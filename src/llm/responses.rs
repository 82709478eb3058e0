//! Scripted replies for the keyword responder

pub const GREETING: &str =
    "Hello! It's nice to hear from you. What would you like to talk about today?";

pub const HELP: &str = "I can chat with you by text or by voice. Hold the microphone button \
to talk, and I'll answer out loud.";

pub const WEATHER: &str = "I can't check live weather yet, but a weather app or website will \
have the latest forecast for your area.";

pub const THANKS: &str = "You're welcome! Let me know if there's anything else.";

pub const FAREWELL: &str = "Goodbye! Talk to you soon.";

/// `{time}` is replaced with the local time
pub const TIME: &str = "It's {time} right now.";

/// `{input}` is replaced with what the user said
pub const FALLBACK: &str = "You said: \"{input}\". I'm a simple demo assistant, so I can only \
answer a few kinds of questions. Try asking for help.";

/// Replies to voice input, used in rotation
pub const VOICE_REPLIES: &[&str] = &[
    "I got your voice message. Thanks for talking with me!",
    "That sounded interesting. Tell me more whenever you like.",
    "Thanks for the message. I'm listening, so go ahead and ask me anything.",
    "I heard you loud and clear. What else is on your mind?",
];

/// Keyword table, checked in order: the first row with a word in the input wins
pub const KEYWORDS: &[(&[&str], &str)] = &[
    (&["weather", "rain", "sunny", "forecast"], WEATHER),
    (&["time", "clock"], TIME),
    (&["thanks", "thank", "thx"], THANKS),
    (&["bye", "goodbye"], FAREWELL),
    (&["hello", "hi", "hey", "greetings"], GREETING),
    (&["help", "how", "what"], HELP),
];
