//! Session store: per-user state with lazy creation and per-user leases.

use super::profile::{Level, Mode, Scenario};
use super::storage::{HistoryMessage, SessionData, SessionStorage};
use crate::error::StorageResult;
use crate::menu::MenuState;
use crate::util::timestamp_ms;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Configuration for session management.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of history messages kept per session. Older entries
    /// are dropped on write.
    pub max_history_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_length: 20,
        }
    }
}

/// A learner's session.
#[derive(Debug, Clone)]
pub struct Session {
    data: SessionData,
    config: SessionConfig,
    modified: bool,
}

impl Session {
    fn new(key: &str, display_name: &str, config: SessionConfig) -> Self {
        Self {
            data: SessionData::new(key, display_name),
            config,
            modified: true,
        }
    }

    const fn from_data(data: SessionData, config: SessionConfig) -> Self {
        Self {
            data,
            config,
            modified: false,
        }
    }

    /// Get the session key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.data.key
    }

    /// Name the tutor addresses the learner by.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.data.display_name
    }

    /// Current proficiency level.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.data.level
    }

    /// Current practice scenario.
    #[must_use]
    pub const fn scenario(&self) -> Scenario {
        self.data.scenario
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.data.mode
    }

    /// Current menu state.
    #[must_use]
    pub const fn menu(&self) -> MenuState {
        self.data.menu
    }

    /// Full stored history, oldest first.
    #[must_use]
    pub const fn history(&self) -> &VecDeque<HistoryMessage> {
        &self.data.history
    }

    /// The last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> impl Iterator<Item = &HistoryMessage> {
        let skip = self.data.history.len().saturating_sub(n);
        self.data.history.iter().skip(skip)
    }

    /// Set the proficiency level. The mode is left untouched.
    pub fn set_level(&mut self, level: Level) {
        self.data.level = level;
        self.touch();
    }

    /// Switch scenario. History from the previous scenario is discarded in
    /// the same step.
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.data.scenario = scenario;
        self.clear_history();
    }

    /// Set the mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.data.mode = mode;
        self.touch();
    }

    /// Set the menu state.
    pub fn set_menu(&mut self, menu: MenuState) {
        self.data.menu = menu;
        self.touch();
    }

    /// Append one user/tutor exchange, dropping the oldest exchanges beyond
    /// the configured capacity. Whole exchanges are dropped, so history
    /// always starts with a user message.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.data.history.push_back(HistoryMessage::user(user));
        self.data.history.push_back(HistoryMessage::assistant(assistant));

        while self.data.history.len() > self.config.max_history_length {
            self.data.history.drain(..2.min(self.data.history.len()));
        }
        self.touch();
    }

    /// Clear the conversation history.
    pub fn clear_history(&mut self) {
        self.data.history.clear();
        self.touch();
    }

    /// Check if the session has been modified since last save.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    fn touch(&mut self) {
        self.data.updated_at = timestamp_ms();
        self.modified = true;
    }

    const fn mark_saved(&mut self) {
        self.modified = false;
    }

    const fn data(&self) -> &SessionData {
        &self.data
    }
}

/// Exclusive access to one user's session.
///
/// While a lease is alive, every other `acquire` for the same key waits.
/// Leases for different keys never block each other.
#[derive(Debug)]
pub struct SessionLease {
    session: Session,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    /// Release the lock and keep a snapshot of the session.
    #[must_use]
    pub fn into_inner(self) -> Session {
        self.session
    }
}

impl Deref for SessionLease {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

/// Process-wide mapping from user identity to session.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    config: SessionConfig,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store over the given storage backend.
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self::with_config(storage, SessionConfig::default())
    }

    /// Create a store with custom config.
    pub fn with_config(storage: impl SessionStorage + 'static, config: SessionConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Lock the user's session, creating and registering a default one on
    /// first contact. `display_name` is only used at creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn acquire(&self, key: &str, display_name: &str) -> StorageResult<SessionLease> {
        let guard = self.key_lock(key).lock_owned().await;

        let session = if let Some(data) = self.storage.load(key).await? {
            debug!(key = %key, "loaded existing session");
            Session::from_data(data, self.config)
        } else {
            let mut session = Session::new(key, display_name, self.config);
            self.storage.save(session.data()).await?;
            session.mark_saved();
            info!(key = %key, display_name = %display_name, "created new session");
            session
        };

        Ok(SessionLease {
            session,
            _guard: guard,
        })
    }

    /// Get or create a session and return a snapshot of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn get_or_create(&self, key: &str, display_name: &str) -> StorageResult<Session> {
        Ok(self.acquire(key, display_name).await?.into_inner())
    }

    /// Save a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn save(&self, session: &mut Session) -> StorageResult<()> {
        if !session.is_modified() {
            return Ok(());
        }
        self.storage.save(session.data()).await?;
        session.mark_saved();
        debug!(key = %session.key(), "session saved");
        Ok(())
    }

    /// List all session keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn list(&self) -> StorageResult<Vec<String>> {
        self.storage.list_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::{MemoryStorage, Role};
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_keeps_first_name() {
        let store = SessionStore::new(MemoryStorage::new());

        let first = store.get_or_create("telegram:1", "Ana").await.unwrap();
        assert_eq!(first.display_name(), "Ana");

        let second = store.get_or_create("telegram:1", "Someone Else").await.unwrap();
        assert_eq!(second.display_name(), "Ana");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changes_persist_after_save() {
        let store = SessionStore::new(MemoryStorage::new());

        let mut lease = store.acquire("cli:me", "Me").await.unwrap();
        lease.set_level(Level::Advanced);
        lease.record_exchange("Hello", "Hi!");
        store.save(&mut lease).await.unwrap();
        assert!(!lease.is_modified());
        drop(lease);

        let reloaded = store.get_or_create("cli:me", "Me").await.unwrap();
        assert_eq!(reloaded.level(), Level::Advanced);
        assert_eq!(reloaded.history().len(), 2);
    }

    #[tokio::test]
    async fn test_scenario_change_clears_history() {
        let store = SessionStore::new(MemoryStorage::new());
        let mut session = store.get_or_create("k", "n").await.unwrap();

        for exchanges in [0, 1, 3, 10] {
            for i in 0..exchanges {
                session.record_exchange(format!("q{i}"), format!("a{i}"));
            }
            session.set_scenario(Scenario::Airport);
            assert!(session.history().is_empty());
        }
        assert_eq!(session.scenario(), Scenario::Airport);
    }

    #[test]
    fn test_profile_changes_keep_mode() {
        let mut session = Session::new("k", "n", SessionConfig::default());
        session.set_mode(Mode::Practicing);
        session.set_level(Level::Intermediate);
        session.set_scenario(Scenario::CoffeeShop);
        assert_eq!(session.mode(), Mode::Practicing);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = SessionConfig {
            max_history_length: 4,
        };
        let mut session = Session::new("k", "n", config);
        for i in 0..5 {
            session.record_exchange(format!("q{i}"), format!("a{i}"));
        }

        let contents: Vec<_> = session.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["q3", "a3", "q4", "a4"]);
        assert_eq!(session.history()[0].role, Role::User);
    }

    #[test]
    fn test_odd_history_limit_drops_whole_exchanges() {
        let config = SessionConfig {
            max_history_length: 5,
        };
        let mut session = Session::new("k", "n", config);
        for i in 0..4 {
            session.record_exchange(format!("q{i}"), format!("a{i}"));
            assert!(session.history().len() <= 5);
            assert_eq!(session.history()[0].role, Role::User);
        }

        let contents: Vec<_> = session.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["q2", "a2", "q3", "a3"]);
    }

    #[test]
    fn test_recent_history_keeps_order() {
        let mut session = Session::new("k", "n", SessionConfig::default());
        for i in 0..3 {
            session.record_exchange(format!("q{i}"), format!("a{i}"));
        }

        let recent: Vec<_> = session.recent_history(4).map(|m| m.content.as_str()).collect();
        assert_eq!(recent, ["q1", "a1", "q2", "a2"]);
        assert_eq!(session.recent_history(10).count(), 6);
    }

    #[tokio::test]
    async fn test_lease_serializes_same_user() {
        let store = Arc::new(SessionStore::new(MemoryStorage::new()));
        let lease = store.acquire("telegram:7", "Bo").await.unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let task = {
            let store = Arc::clone(&store);
            let acquired = Arc::clone(&acquired);
            tokio::spawn(async move {
                let _lease = store.acquire("telegram:7", "Bo").await.unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        // Other users are not blocked
        let other = tokio::time::timeout(Duration::from_millis(200), store.acquire("telegram:8", "Cy"))
            .await
            .expect("different key must not wait");
        assert!(other.is_ok());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!acquired.load(Ordering::SeqCst));

        drop(lease);
        task.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
