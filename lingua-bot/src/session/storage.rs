//! Session storage backends.
//!
//! The store talks to a [`SessionStorage`] so a durable backend can be
//! swapped in without touching call sites. Only the in-memory backend ships;
//! sessions live as long as the process.

use super::profile::{Level, Mode, Scenario};
use crate::completion::MessageRole;
use crate::error::StorageResult;
use crate::menu::MenuState;
use crate::util::timestamp_ms;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner.
    User,
    /// The tutor.
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// A single message in conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Who sent it.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Timestamp (Unix milliseconds).
    pub timestamp: u64,
}

impl HistoryMessage {
    /// Create a new history message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp_ms(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Session data stored in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Session key (e.g., "telegram:123456").
    pub key: String,
    /// Name used to address the learner.
    pub display_name: String,
    /// Proficiency level.
    #[serde(default)]
    pub level: Level,
    /// Practice scenario.
    #[serde(default)]
    pub scenario: Scenario,
    /// Configuring or practicing.
    #[serde(default)]
    pub mode: Mode,
    /// Current menu state.
    #[serde(default)]
    pub menu: MenuState,
    /// Conversation history, oldest first.
    #[serde(default)]
    pub history: VecDeque<HistoryMessage>,
    /// Session creation timestamp.
    pub created_at: u64,
    /// Last activity timestamp.
    pub updated_at: u64,
}

impl SessionData {
    /// Create a new session with default profile.
    #[must_use]
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = timestamp_ms();
        Self {
            key: key.into(),
            display_name: display_name.into(),
            level: Level::default(),
            scenario: Scenario::default(),
            mode: Mode::default(),
            menu: MenuState::default(),
            history: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trait for session storage backends.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Load a session by key.
    async fn load(&self, key: &str) -> StorageResult<Option<SessionData>>;

    /// Save a session.
    async fn save(&self, session: &SessionData) -> StorageResult<()>;

    /// List all session keys.
    async fn list_keys(&self) -> StorageResult<Vec<String>>;
}

/// In-memory session storage.
///
/// Fast but not persistent across restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemoryStorage {
    /// Create a new memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<SessionData>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn save(&self, session: &SessionData) -> StorageResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
