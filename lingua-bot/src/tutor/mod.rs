//! Conversation engine: prompt templates, context window and provider calls.

mod context;
mod engine;
mod prompts;

pub use context::ContextBuilder;
pub use engine::{HistoryPolicy, TutorConfig, TutorEngine};
pub use prompts::{CHAT_APOLOGY, VOCABULARY_APOLOGY};
