//! Conversation engine.

use super::context::ContextBuilder;
use super::prompts::{CHAT_APOLOGY, VOCABULARY_APOLOGY};
use crate::completion::{CompletionProvider, DEFAULT_MODEL};
use crate::error::ProviderResult;
use crate::session::{Mode, Session};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// When a successful exchange is appended to history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Only while practicing; redirect replies are not remembered.
    #[default]
    PracticeOnly,
    /// In every mode.
    Always,
}

impl HistoryPolicy {
    const fn records(self, mode: Mode) -> bool {
        match self {
            Self::PracticeOnly => matches!(mode, Mode::Practicing),
            Self::Always => true,
        }
    }
}

/// Tutor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Completion model.
    pub model: String,
    /// Language being practiced.
    pub target_language: String,
    /// Language used for explanations and menus.
    pub native_language: String,
    /// History entries included in each prompt.
    pub history_window: usize,
    /// When exchanges are recorded.
    pub history_policy: HistoryPolicy,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            target_language: "English".to_string(),
            native_language: "Spanish".to_string(),
            history_window: ContextBuilder::DEFAULT_HISTORY_WINDOW,
            history_policy: HistoryPolicy::default(),
        }
    }
}

/// Builds prompts from session state, calls the provider and keeps history.
#[derive(Debug)]
pub struct TutorEngine<P> {
    provider: P,
    context: ContextBuilder,
    model: String,
    history_policy: HistoryPolicy,
}

impl<P: CompletionProvider> TutorEngine<P> {
    /// Create an engine with default settings.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, &TutorConfig::default())
    }

    /// Create an engine from configuration.
    pub fn with_config(provider: P, config: &TutorConfig) -> Self {
        Self {
            provider,
            context: ContextBuilder::new(&config.target_language, &config.native_language)
                .with_history_window(config.history_window),
            model: config.model.clone(),
            history_policy: config.history_policy,
        }
    }

    /// Answer `user_text`, falling back to a fixed apology on provider
    /// failure. History is left unchanged when the provider fails.
    pub async fn respond(&self, session: &mut Session, user_text: &str) -> String {
        match self.try_respond(session, user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session = %session.key(), error = %e, "tutor reply failed");
                CHAT_APOLOGY.to_string()
            }
        }
    }

    /// Answer `user_text`, surfacing provider errors.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; the session is not modified.
    pub async fn try_respond(&self, session: &mut Session, user_text: &str) -> ProviderResult<String> {
        let messages = self.context.build_messages(session, user_text);
        debug!(
            session = %session.key(),
            mode = ?session.mode(),
            messages = messages.len(),
            "requesting tutor reply"
        );

        let reply = self.provider.complete(&self.model, &messages).await?;

        if self.history_policy.records(session.mode()) {
            session.record_exchange(user_text, reply.as_str());
        }
        Ok(reply)
    }

    /// Five vocabulary items for the session's scenario. Never mutates the
    /// session.
    pub async fn vocabulary(&self, session: &Session) -> String {
        let messages = self.context.build_vocabulary_request(session);
        match self.provider.complete(&self.model, &messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session = %session.key(), error = %e, "vocabulary request failed");
                VOCABULARY_APOLOGY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MessageRole;
    use crate::completion::mock::ScriptedProvider;
    use crate::session::{Level, MemoryStorage, Scenario, SessionStore};

    async fn session() -> Session {
        SessionStore::new(MemoryStorage::new())
            .get_or_create("cli:me", "Ana")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_practicing_reply_is_recorded() {
        let provider = ScriptedProvider::new().reply("Hi Ana!");
        let engine = TutorEngine::new(provider.clone());
        let mut session = session().await;
        session.set_mode(Mode::Practicing);

        let reply = engine.respond(&mut session, "Hello").await;

        assert_eq!(reply, "Hi Ana!");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].content, "Hello");
        assert_eq!(session.history()[1].content, "Hi Ana!");
    }

    #[tokio::test]
    async fn test_provider_failure_returns_apology() {
        let engine = TutorEngine::new(ScriptedProvider::new().fail());
        let mut session = session().await;
        session.set_mode(Mode::Practicing);
        session.record_exchange("u0", "a0");

        let reply = engine.respond(&mut session, "Hello").await;

        assert_eq!(reply, CHAT_APOLOGY);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_try_respond_surfaces_error() {
        let engine = TutorEngine::new(ScriptedProvider::new().fail());
        let mut session = session().await;
        assert!(engine.try_respond(&mut session, "Hello").await.is_err());
    }

    #[tokio::test]
    async fn test_configuring_uses_redirect_and_skips_history() {
        let provider = ScriptedProvider::new().reply("Usa el menú");
        let engine = TutorEngine::new(provider.clone());
        let mut session = session().await;

        let reply = engine.respond(&mut session, "Hello").await;

        assert_eq!(reply, "Usa el menú");
        assert!(session.history().is_empty());
        let call = provider.last_call();
        assert!(call[0].content.contains("/menu"));
        assert_eq!(call.len(), 2);
    }

    #[tokio::test]
    async fn test_always_policy_records_while_configuring() {
        let config = TutorConfig {
            history_policy: HistoryPolicy::Always,
            ..TutorConfig::default()
        };
        let engine = TutorEngine::with_config(ScriptedProvider::new(), &config);
        let mut session = session().await;

        engine.respond(&mut session, "Hello").await;

        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_prompt_window_is_last_four() {
        let provider = ScriptedProvider::new();
        let engine = TutorEngine::new(provider.clone());
        let mut session = session().await;
        session.set_mode(Mode::Practicing);
        for i in 0..3 {
            session.record_exchange(format!("u{i}"), format!("a{i}"));
        }

        engine.respond(&mut session, "next").await;

        let call = provider.last_call();
        assert_eq!(call.len(), 6);
        assert_eq!(call[1].content, "u1");
        assert_eq!(call[5].role, MessageRole::User);
        assert_eq!(call[5].content, "next");
    }

    #[tokio::test]
    async fn test_vocabulary_does_not_touch_session() {
        let provider = ScriptedProvider::new().reply("1. boarding pass");
        let engine = TutorEngine::new(provider.clone());
        let mut session = session().await;
        session.set_level(Level::Advanced);
        session.set_scenario(Scenario::Airport);
        let before = session.history().len();

        let text = engine.vocabulary(&session).await;

        assert_eq!(text, "1. boarding pass");
        assert_eq!(session.history().len(), before);
        assert!(provider.last_call()[1].content.contains("Airport"));
    }

    #[tokio::test]
    async fn test_vocabulary_failure() {
        let engine = TutorEngine::new(ScriptedProvider::new().fail());
        let session = session().await;
        assert_eq!(engine.vocabulary(&session).await, VOCABULARY_APOLOGY);
    }
}
