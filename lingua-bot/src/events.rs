//! Events flowing through the message bus.
//!
//! Transports decode what they receive into [`InboundEvent`]s (commands,
//! menu selections, free text) and render [`OutboundMessage`]s (text, a new
//! menu, or an in-place menu edit).

use crate::menu::{Menu, Selection};
use crate::util::generate_message_id;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Who sent an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable identifier within the channel.
    pub id: String,
    /// Name the tutor addresses the user by.
    pub display_name: String,
}

impl UserIdentity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// `/start`
    Start,
    /// `/menu`
    Menu,
}

impl Command {
    /// Parse a command message such as `/start`, `/menu@my_bot` or
    /// `/start payload`. Returns `None` for anything else.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "menu" => Some(Self::Menu),
            _ => None,
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A bot command.
    Command(Command),
    /// A menu button was pressed.
    Selection {
        /// The decoded selection.
        selection: Selection,
        /// Transport reference of the message carrying the menu, used to
        /// edit it in place.
        message_ref: Option<String>,
    },
    /// Free text.
    Text(String),
}

impl EventKind {
    /// Classify a chat message: known commands become [`EventKind::Command`],
    /// other `/`-prefixed messages are unknown commands (`None`), anything
    /// else is text.
    #[must_use]
    pub fn from_message(text: &str) -> Option<Self> {
        if text.trim_start().starts_with('/') {
            Command::parse(text).map(Self::Command)
        } else {
            Some(Self::Text(text.to_string()))
        }
    }
}

/// An event from a transport to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Unique event ID.
    pub id: String,
    /// Channel identifier (e.g., "telegram", "cli").
    pub channel: String,
    /// Chat the event came from; replies go here.
    pub chat_id: String,
    /// Sender.
    pub user: UserIdentity,
    /// Payload.
    pub kind: EventKind,
    /// Timestamp when the event was received.
    pub timestamp: SystemTime,
}

impl InboundEvent {
    /// Create a new inbound event.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        user: UserIdentity,
        kind: EventKind,
    ) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            user,
            kind,
            timestamp: SystemTime::now(),
        }
    }

    /// Free-text event.
    pub fn text(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        user: UserIdentity,
        text: impl Into<String>,
    ) -> Self {
        Self::new(channel, chat_id, user, EventKind::Text(text.into()))
    }

    /// Command event.
    pub fn command(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        user: UserIdentity,
        command: Command,
    ) -> Self {
        Self::new(channel, chat_id, user, EventKind::Command(command))
    }

    /// Selection event.
    pub fn selection(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        user: UserIdentity,
        selection: Selection,
        message_ref: Option<String>,
    ) -> Self {
        Self::new(
            channel,
            chat_id,
            user,
            EventKind::Selection {
                selection,
                message_ref,
            },
        )
    }

    /// Session key for the sender: `"<channel>:<user id>"`.
    #[must_use]
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.user.id)
    }
}

/// Message format hint for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Plain text, no formatting.
    #[default]
    Plain,
    /// Markdown formatted text.
    Markdown,
}

/// What to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundPayload {
    /// A text message.
    Text {
        /// Message body.
        body: String,
        /// Format hint.
        format: MessageFormat,
    },
    /// A new menu message.
    Menu(Menu),
    /// Replace an existing menu message.
    EditMenu {
        /// Transport reference of the message to edit.
        message_ref: String,
        /// Replacement menu.
        menu: Menu,
    },
}

/// A message from the dispatcher to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Unique message ID.
    pub id: String,
    /// Target channel identifier.
    pub channel: String,
    /// Target chat identifier.
    pub chat_id: String,
    /// Payload.
    pub payload: OutboundPayload,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>, payload: OutboundPayload) -> Self {
        Self {
            id: generate_message_id(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            payload,
        }
    }

    /// Text reply to `event`.
    pub fn text(event: &InboundEvent, body: impl Into<String>, format: MessageFormat) -> Self {
        Self::new(
            &event.channel,
            &event.chat_id,
            OutboundPayload::Text {
                body: body.into(),
                format,
            },
        )
    }

    /// New menu in reply to `event`.
    pub fn menu(event: &InboundEvent, menu: Menu) -> Self {
        Self::new(&event.channel, &event.chat_id, OutboundPayload::Menu(menu))
    }

    /// Edit of `message_ref` in reply to `event`.
    pub fn edit_menu(event: &InboundEvent, message_ref: impl Into<String>, menu: Menu) -> Self {
        Self::new(
            &event.channel,
            &event.chat_id,
            OutboundPayload::EditMenu {
                message_ref: message_ref.into(),
                menu,
            },
        )
    }

    /// The menu carried by this message, if any.
    #[must_use]
    pub const fn menu_ref(&self) -> Option<&Menu> {
        match &self.payload {
            OutboundPayload::Menu(menu) | OutboundPayload::EditMenu { menu, .. } => Some(menu),
            OutboundPayload::Text { .. } => None,
        }
    }
}
