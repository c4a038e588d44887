//! Completion service with external LLM providers (Snowflake Cortex,
//! OpenAI, Anthropic, Groq) and the prompt builders for the lyric features.
//!
//! Responses are read as SSE streams and collected into one string.

pub mod completion;
pub mod config;
pub mod prompts;
pub mod providers;
pub mod types;

pub use completion::ConfiguredCompletion;
pub use config::LLMConfig;
pub use types::*;
