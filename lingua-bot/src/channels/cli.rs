//! Terminal channel.
//!
//! Reads lines from stdin and prints replies to stdout. Menus are printed as
//! numbered lists; `#N` presses the N-th button of the last menu shown.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{Command, EventKind, InboundEvent, OutboundMessage, OutboundPayload, UserIdentity};
use crate::menu::{Menu, Selection};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Channel name, also used in session keys.
pub const CLI_CHANNEL: &str = "cli";

const CHAT_ID: &str = "direct";

/// CLI channel configuration.
#[derive(Debug, Clone)]
pub struct CliChannelConfig {
    /// Prompt printed before each input line.
    pub prompt: String,
    /// Local user id.
    pub user_id: String,
    /// Name the tutor uses.
    pub display_name: String,
}

impl Default for CliChannelConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            user_id: "local".to_string(),
            display_name: "Learner".to_string(),
        }
    }
}

impl CliChannelConfig {
    /// Create a default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prompt string.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    fn identity(&self) -> UserIdentity {
        UserIdentity::new(&self.user_id, &self.display_name)
    }
}

/// One decoded input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliInput {
    /// Blank line.
    Empty,
    /// `exit` or `quit`.
    Exit,
    /// An event to publish.
    Event(EventKind),
    /// Something that cannot be acted on; the message explains why.
    Invalid(String),
}

/// Decode a line typed by the user against the last menu shown.
#[must_use]
pub fn parse_input(line: &str, last_menu: Option<&Menu>) -> CliInput {
    let line = line.trim();
    if line.is_empty() {
        return CliInput::Empty;
    }
    if matches!(line, "exit" | "quit" | "/quit") {
        return CliInput::Exit;
    }
    if line.starts_with('/') {
        return match Command::parse(line) {
            Some(command) => CliInput::Event(EventKind::Command(command)),
            None => CliInput::Invalid(format!("comando desconocido: {line}")),
        };
    }
    if let Some(number) = line.strip_prefix('#') {
        let Some(menu) = last_menu else {
            return CliInput::Invalid("no hay ningún menú abierto; escribe /menu".to_string());
        };
        let button = number
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| menu.buttons().nth(i));
        return match button.and_then(|b| Selection::parse(&b.token)) {
            Some(selection) => CliInput::Event(EventKind::Selection {
                selection,
                message_ref: None,
            }),
            None => CliInput::Invalid(format!("opción no válida: {line}")),
        };
    }
    CliInput::Event(EventKind::Text(line.to_string()))
}

/// Format a menu as body plus a numbered button list.
#[must_use]
pub fn format_menu(menu: &Menu) -> String {
    let mut out = strip_markdown(&menu.body);
    out.push('\n');
    for (i, button) in menu.buttons().enumerate() {
        let _ = write!(out, "\n  #{} {}", i + 1, button.label);
    }
    out
}

fn strip_markdown(text: &str) -> String {
    text.replace("**", "")
}

fn format_outbound(msg: &OutboundMessage) -> String {
    match &msg.payload {
        OutboundPayload::Text { body, .. } => strip_markdown(body),
        OutboundPayload::Menu(menu) | OutboundPayload::EditMenu { menu, .. } => format_menu(menu),
    }
}

/// Terminal channel.
#[derive(Debug)]
pub struct CliChannel {
    base: Arc<ChannelBase>,
    config: CliChannelConfig,
    last_menu: Arc<Mutex<Option<Menu>>>,
    exit: Arc<Notify>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CliChannel {
    /// Create a CLI channel with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CliChannelConfig::default())
    }

    /// Create a CLI channel with the given configuration.
    #[must_use]
    pub fn with_config(config: CliChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(CLI_CHANNEL)),
            config,
            last_menu: Arc::new(Mutex::new(None)),
            exit: Arc::new(Notify::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Notified once when the user types `exit` or stdin closes.
    #[must_use]
    pub fn exit_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.exit)
    }

    #[allow(clippy::print_stdout)]
    fn print(text: &str, prompt: &str) {
        println!("\n{text}\n");
        print!("{prompt}");
        let _ = std::io::stdout().flush();
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let mut outbound_rx = bus.subscribe_channel(CLI_CHANNEL).await;
        let output = {
            let base = Arc::clone(&self.base);
            let last_menu = Arc::clone(&self.last_menu);
            let prompt = self.config.prompt.clone();
            tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    if let Some(menu) = msg.menu_ref() {
                        *last_menu.lock().unwrap_or_else(PoisonError::into_inner) = Some(menu.clone());
                    }
                    Self::print(&format_outbound(&msg), &prompt);
                    base.record_sent().await;
                }
                debug!("CLI output task finished");
            })
        };

        let input = {
            let base = Arc::clone(&self.base);
            let last_menu = Arc::clone(&self.last_menu);
            let exit = Arc::clone(&self.exit);
            let inbound = bus.inbound_handle();
            let config = self.config.clone();
            tokio::spawn(async move {
                Self::print("Escribe /start para empezar, 'exit' para salir.", &config.prompt);
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                loop {
                    let line = match lines.next_line().await {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            base.record_error(format!("stdin: {e}")).await;
                            break;
                        }
                    };

                    let menu = last_menu.lock().unwrap_or_else(PoisonError::into_inner).clone();
                    let kind = match parse_input(&line, menu.as_ref()) {
                        CliInput::Empty => continue,
                        CliInput::Exit => break,
                        CliInput::Invalid(reason) => {
                            Self::print(&reason, &config.prompt);
                            continue;
                        }
                        CliInput::Event(kind) => kind,
                    };

                    let event = InboundEvent::new(CLI_CHANNEL, CHAT_ID, config.identity(), kind);
                    if let Err(e) = inbound.publish(event).await {
                        warn!(error = %e, "CLI input dropped");
                        break;
                    }
                    base.record_received().await;
                }
                exit.notify_one();
            })
        };

        self.tasks
            .lock()
            .map_err(|_| ChannelError::internal("task list poisoned"))?
            .extend([output, input]);

        self.base.set_state(ChannelState::Running).await;
        info!("CLI channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("CLI channel stopped");
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}
