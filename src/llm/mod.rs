//! Reply generation
//!
//! There is no language model behind the assistant: [`KeywordResponder`] maps the
//! input to a scripted reply. Anything implementing [`ResponseGenerator`] can take
//! its place.
//!
//! # Usage
//!
//! ```rust,ignore
//! use murmur::llm::{GenerationConfig, InputKind, KeywordResponder, ResponseGenerator};
//!
//! let responder = KeywordResponder::new(GenerationConfig::default());
//! let reply = responder.generate("hello there", InputKind::Text).await?;
//! ```

pub mod config;
pub mod responder;
pub mod responses;

pub use config::GenerationConfig;
pub use responder::{InputKind, KeywordResponder, ResponseGenerator};
