//! lingua-bot: a chat bot for practicing a foreign language.
//!
//! The learner picks a level and a scenario from an inline menu, then chats
//! with a tutor backed by a hosted completion model. Each reply continues the
//! role-play, corrects mistakes and suggests how to keep the conversation
//! going.
//!
//! # Architecture
//!
//! - **Session** ([`session`]) - per-user profile, mode, menu state and
//!   bounded history, with per-user leases
//! - **Menu** ([`menu`]) - selection tokens, the navigation table and menu
//!   rendering
//! - **Tutor** ([`tutor`]) - prompt templates, context window and provider
//!   calls
//! - **Completion** ([`completion`]) - provider trait and the Groq client
//! - **Dispatch** ([`dispatch`]) - routes events to the menu or the tutor
//! - **Message Bus** ([`bus`]) and **Channels** ([`channels`]) - transports
//! - **Gateway** ([`gateway`]) - runs everything
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lingua_bot::prelude::*;
//! use std::sync::Arc;
//!
//! let engine = TutorEngine::new(GroqClient::builder().api_key(key).build()?);
//! let store = Arc::new(SessionStore::new(MemoryStorage::new()));
//! let gateway = Gateway::new(Dispatcher::new(store, engine));
//! gateway.register(CliChannel::new()).await;
//! gateway.run().await?;
//! ```
//!
//! # Features
//!
//! - `telegram` (default) - Telegram transport via teloxide

pub mod bus;
pub mod channel;
pub mod channels;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gateway;
pub mod menu;
pub mod session;
pub mod tutor;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{
        BotError, BusError, BusResult, ChannelError, ChannelResult, ConfigError, ConfigResult,
        ErrorContext, ProviderError, ProviderResult, Result, StorageError, StorageResult,
    };

    pub use crate::bus::{InboundHandle, MessageBus};

    pub use crate::channel::{Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus};
    pub use crate::channels::CliChannel;
    pub use crate::channels::cli::CliChannelConfig;
    #[cfg(feature = "telegram")]
    pub use crate::channels::{TelegramChannel, telegram::TelegramChannelConfig};

    pub use crate::completion::{ChatMessage, CompletionProvider, GroqClient, MessageRole};

    pub use crate::config::{
        BotConfig, ConfigIssue, GroqConfig, IssueLevel, TelegramConfig, config_path, init_config,
        load_config, save_config,
    };

    pub use crate::dispatch::Dispatcher;

    pub use crate::events::{
        Command, EventKind, InboundEvent, MessageFormat, OutboundMessage, OutboundPayload,
        UserIdentity,
    };

    pub use crate::gateway::Gateway;

    pub use crate::menu::{Menu, MenuState, Selection};

    pub use crate::session::{
        Level, MemoryStorage, Mode, Scenario, Session, SessionConfig, SessionStorage, SessionStore,
    };

    pub use crate::tutor::{HistoryPolicy, TutorConfig, TutorEngine};
}
