//! Per-user session state.
//!
//! A session holds the learner's profile (level, scenario), the current mode
//! and menu state, and a bounded conversation history. Sessions are created
//! lazily on first contact and live in a [`SessionStore`].

mod profile;
mod storage;
mod store;

pub use profile::{Level, Mode, Scenario};
pub use storage::{HistoryMessage, MemoryStorage, Role, SessionData, SessionStorage};
pub use store::{Session, SessionConfig, SessionLease, SessionStore};
