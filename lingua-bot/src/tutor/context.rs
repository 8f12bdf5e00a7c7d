//! Prompt context building.
//!
//! Turns a session plus the learner's new message into the message list sent
//! to the completion provider.

use super::prompts::{self, PromptVars};
use crate::completion::ChatMessage;
use crate::session::{Mode, Session};

/// Builder for the message list sent to the provider.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    target_language: String,
    native_language: String,
    history_window: usize,
}

impl ContextBuilder {
    /// Number of history entries included by default (two exchanges).
    pub const DEFAULT_HISTORY_WINDOW: usize = 4;

    /// Create a builder for the given language pair.
    pub fn new(target_language: impl Into<String>, native_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            native_language: native_language.into(),
            history_window: Self::DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Set how many trailing history entries are included.
    #[must_use]
    pub const fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Number of trailing history entries included.
    #[must_use]
    pub const fn history_window(&self) -> usize {
        self.history_window
    }

    fn vars<'a>(&'a self, session: &'a Session) -> PromptVars<'a> {
        PromptVars {
            name: session.display_name(),
            level: session.level(),
            scenario: session.scenario(),
            target_language: &self.target_language,
            native_language: &self.native_language,
        }
    }

    /// System prompt for the session's current mode.
    #[must_use]
    pub fn system_prompt(&self, session: &Session) -> String {
        let vars = self.vars(session);
        match session.mode() {
            Mode::Configuring => prompts::redirect_prompt(&vars),
            Mode::Practicing => prompts::tutor_prompt(&vars),
        }
    }

    /// System prompt, then the trailing history window in order, then the new
    /// user message.
    #[must_use]
    pub fn build_messages(&self, session: &Session, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history_window + 2);
        messages.push(ChatMessage::system(self.system_prompt(session)));
        messages.extend(
            session
                .recent_history(self.history_window)
                .map(|m| ChatMessage::new(m.role.into(), m.content.clone())),
        );
        messages.push(ChatMessage::user(user_text));
        messages
    }

    /// Messages for the one-shot vocabulary request. History is not included.
    #[must_use]
    pub fn build_vocabulary_request(&self, session: &Session) -> Vec<ChatMessage> {
        let vars = self.vars(session);
        vec![
            ChatMessage::system(prompts::vocabulary_prompt(&vars)),
            ChatMessage::user(prompts::vocabulary_request(&vars)),
        ]
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new("English", "Spanish")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MessageRole;
    use crate::session::{Level, MemoryStorage, SessionStore};

    async fn session() -> Session {
        SessionStore::new(MemoryStorage::new())
            .get_or_create("cli:me", "Ana")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_history() {
        let session = session().await;
        let messages = ContextBuilder::default().build_messages(&session, "Hola");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Hola");
    }

    #[tokio::test]
    async fn test_window_takes_last_entries_in_order() {
        let mut session = session().await;
        for i in 0..5 {
            session.record_exchange(format!("u{i}"), format!("a{i}"));
        }

        let messages = ContextBuilder::default().build_messages(&session, "next");
        let contents: Vec<_> = messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["u3", "a3", "u4", "a4", "next"]);

        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
    }

    #[tokio::test]
    async fn test_custom_window() {
        let mut session = session().await;
        session.record_exchange("u0", "a0");
        session.record_exchange("u1", "a1");

        let messages = ContextBuilder::default()
            .with_history_window(2)
            .build_messages(&session, "next");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "u1");
    }

    #[tokio::test]
    async fn test_template_follows_mode() {
        let mut session = session().await;
        let builder = ContextBuilder::default();
        assert!(builder.system_prompt(&session).contains("/menu"));

        session.set_mode(Mode::Practicing);
        session.set_level(Level::Intermediate);
        let prompt = builder.system_prompt(&session);
        assert!(prompt.contains("tutor"));
        assert!(prompt.contains("Intermediate"));
        assert!(prompt.contains("General Conversation"));
    }

    #[tokio::test]
    async fn test_vocabulary_request_ignores_history() {
        let mut session = session().await;
        session.record_exchange("u0", "a0");

        let messages = ContextBuilder::default().build_vocabulary_request(&session);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("General Conversation"));
    }
}
