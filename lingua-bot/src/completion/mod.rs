//! Completion providers for the tutoring conversation.
//!
//! A provider is a stateless request/response text generator: it receives an
//! ordered list of chat messages and returns the generated reply. Groq's
//! OpenAI-compatible chat completions API is the shipped implementation.

mod groq;
#[cfg(test)]
pub(crate) mod mock;
mod provider;

pub use groq::{DEFAULT_MODEL, GROQ_API_BASE_URL, GroqClient, GroqClientBuilder};
pub use provider::{ChatMessage, CompletionProvider, MessageRole};
