//! Telegram channel implementation using teloxide.
//!
//! Commands, text messages and inline-keyboard callbacks become
//! [`InboundEvent`]s. Menus are sent as messages with an inline keyboard and
//! edited in place when the learner presses one of their buttons.
//!
//! # Setup
//!
//! 1. Create a bot via [@BotFather](https://t.me/botfather)
//! 2. Export the token as `TELEGRAM_TOKEN`
//! 3. `lingua run`

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{EventKind, InboundEvent, MessageFormat, OutboundMessage, OutboundPayload, UserIdentity};
use crate::menu::{Menu, Selection};
use crate::util::split_into_chunks;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, User};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Channel name, also used in session keys.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Telegram's message length limit.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramChannelConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Maximum message length before splitting.
    pub max_message_length: usize,
}

impl std::fmt::Debug for TelegramChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannelConfig")
            .field("token", &"<redacted>")
            .field("max_message_length", &self.max_message_length)
            .finish()
    }
}

impl TelegramChannelConfig {
    /// Create a config with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}

/// Telegram channel.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    config: TelegramChannelConfig,
    shutdown: RwLock<Option<ShutdownToken>>,
    output_task: RwLock<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a Telegram channel with the given configuration.
    #[must_use]
    pub fn new(config: TelegramChannelConfig) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(TELEGRAM_CHANNEL)),
            config,
            shutdown: RwLock::new(None),
            output_task: RwLock::new(None),
        }
    }
}

/// Convert Markdown to Telegram-safe HTML.
fn markdown_to_telegram_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let patterns = MarkdownPatterns::get();

    let mut result = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    // Code first so nothing inside it is rewritten.
    result = patterns
        .code_block
        .replace_all(&result, "<pre>$1</pre>")
        .into_owned();
    result = patterns
        .code_inline
        .replace_all(&result, "<code>$1</code>")
        .into_owned();

    result = patterns
        .bold_asterisk
        .replace_all(&result, "<b>$1</b>")
        .into_owned();
    result = patterns
        .bold_underscore
        .replace_all(&result, "<b>$1</b>")
        .into_owned();

    // Italic after bold.
    result = patterns
        .italic_asterisk
        .replace_all(&result, "$1<i>$2</i>")
        .into_owned();
    result = patterns
        .italic_underscore
        .replace_all(&result, "$1<i>$2</i>")
        .into_owned();

    result = patterns
        .strikethrough
        .replace_all(&result, "<s>$1</s>")
        .into_owned();
    result = patterns
        .link
        .replace_all(&result, r#"<a href="$2">$1</a>"#)
        .into_owned();

    result
}

/// Cached regex patterns for markdown to HTML conversion.
struct MarkdownPatterns {
    bold_asterisk: Regex,
    bold_underscore: Regex,
    italic_asterisk: Regex,
    italic_underscore: Regex,
    code_inline: Regex,
    code_block: Regex,
    strikethrough: Regex,
    link: Regex,
}

impl MarkdownPatterns {
    fn new() -> Self {
        Self {
            bold_asterisk: Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"),
            bold_underscore: Regex::new(r"__(.+?)__").expect("valid regex"),
            italic_asterisk: Regex::new(r"(^|[^*\w])\*([^*\s][^*\n]*?)\*").expect("valid regex"),
            italic_underscore: Regex::new(r"(^|[^_\w])_([^_\s][^_\n]*?)_").expect("valid regex"),
            code_inline: Regex::new(r"`([^`]+)`").expect("valid regex"),
            code_block: Regex::new(r"```\w*\n?([\s\S]*?)```").expect("valid regex"),
            strikethrough: Regex::new(r"~~(.+?)~~").expect("valid regex"),
            link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"),
        }
    }

    fn get() -> &'static Self {
        static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::new)
    }
}

/// Split Telegram HTML into chunks of at most `max_len` bytes.
///
/// Tags and entities are never cut. Tags still open at a cut are closed at
/// the end of the chunk and reopened at the start of the next one, so every
/// chunk parses on its own. Cuts prefer the last line break.
fn split_html(html: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut open: Vec<(&str, &str)> = Vec::new();
    let mut current = String::new();
    // Length of the reopened tags at the start of `current`.
    let mut prefix_len = 0;
    // Offset just past the last newline in `current`, with the tags open there.
    let mut line_break: Option<(usize, Vec<(&str, &str)>)> = None;

    for token in html_tokens(html) {
        let mut next_open = open.clone();
        apply_tag(&mut next_open, token);

        while current.len() + token.len() + closing_tags(&next_open).len() > max_len
            && current.len() > prefix_len
        {
            let (cut, stack) = match line_break.take() {
                Some((pos, stack)) if pos > prefix_len => (pos, stack),
                _ => (current.len(), open.clone()),
            };
            let rest = current.split_off(cut);
            current.push_str(&closing_tags(&stack));
            chunks.push(std::mem::take(&mut current));

            current = stack.iter().map(|(_, tag)| *tag).collect();
            prefix_len = current.len();
            current.push_str(&rest);
        }

        current.push_str(token);
        open = next_open;
        if token == "\n" {
            line_break = Some((current.len(), open.clone()));
        }
    }
    if current.len() > prefix_len {
        current.push_str(&closing_tags(&open));
        chunks.push(current);
    }

    chunks.retain(|chunk| !strip_tags(chunk).trim().is_empty());
    chunks
}

/// Tags, entities and single characters.
fn html_tokens(html: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        let len = match c {
            '<' => rest.find('>').map_or(1, |i| i + 1),
            '&' => rest.find(';').filter(|&i| i <= 8).map_or(1, |i| i + 1),
            _ => c.len_utf8(),
        };
        let (token, tail) = rest.split_at(len);
        tokens.push(token);
        rest = tail;
    }
    tokens
}

fn apply_tag<'a>(open: &mut Vec<(&'a str, &'a str)>, token: &'a str) {
    if !(token.starts_with('<') && token.ends_with('>')) {
        return;
    }
    if let Some(name) = token.strip_prefix("</") {
        let name = name.trim_end_matches('>');
        if let Some(pos) = open.iter().rposition(|(n, _)| *n == name) {
            open.remove(pos);
        }
    } else {
        let name = token[1..token.len() - 1]
            .split_whitespace()
            .next()
            .unwrap_or_default();
        open.push((name, token));
    }
}

fn closing_tags(open: &[(&str, &str)]) -> String {
    open.iter().rev().map(|(name, _)| format!("</{name}>")).collect()
}

fn strip_tags(html: &str) -> String {
    html_tokens(html)
        .into_iter()
        .filter(|t| !(t.starts_with('<') && t.ends_with('>') && t.len() > 1))
        .collect()
}

fn keyboard(menu: &Menu) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(menu.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.token.clone()))
            .collect::<Vec<_>>()
    }))
}

fn identity(user: &User) -> UserIdentity {
    let name = if user.first_name.trim().is_empty() {
        user.username.clone().unwrap_or_else(|| user.id.to_string())
    } else {
        user.first_name.clone()
    };
    UserIdentity::new(user.id.0.to_string(), name)
}

fn parse_chat_id(chat_id: &str) -> ChannelResult<ChatId> {
    chat_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| ChannelError::send(format!("invalid chat ID: {chat_id}")))
}

/// Render one outbound message.
async fn deliver(bot: &Bot, msg: &OutboundMessage, max_len: usize) -> ChannelResult<()> {
    let chat_id = parse_chat_id(&msg.chat_id)?;

    match &msg.payload {
        OutboundPayload::Text { body, format } => {
            let (chunks, html) = match format {
                MessageFormat::Markdown => (split_html(&markdown_to_telegram_html(body), max_len), true),
                MessageFormat::Plain => (split_into_chunks(body, max_len), false),
            };
            for chunk in chunks {
                let request = bot.send_message(chat_id, chunk);
                let result = if html {
                    request.parse_mode(ParseMode::Html).await
                } else {
                    request.await
                };
                result.map_err(|e| ChannelError::send(e.to_string()))?;
            }
        }
        OutboundPayload::Menu(menu) => send_menu(bot, chat_id, menu).await?,
        OutboundPayload::EditMenu { message_ref, menu } => {
            let edited = match message_ref.parse::<i32>() {
                Ok(id) => bot
                    .edit_message_text(chat_id, MessageId(id), markdown_to_telegram_html(&menu.body))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard(menu))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(_) => Err(format!("invalid message ref: {message_ref}")),
            };
            if let Err(e) = edited {
                debug!(error = %e, "menu edit failed, sending a new menu");
                send_menu(bot, chat_id, menu).await?;
            }
        }
    }
    Ok(())
}

async fn send_menu(bot: &Bot, chat_id: ChatId, menu: &Menu) -> ChannelResult<()> {
    bot.send_message(chat_id, markdown_to_telegram_html(&menu.body))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard(menu))
        .await
        .map_err(|e| ChannelError::send(e.to_string()))?;
    Ok(())
}

async fn handle_message(msg: Message, inbound: InboundHandle, base: Arc<ChannelBase>) {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return;
    };
    let chat_id = msg.chat.id.0.to_string();
    let user = identity(user);

    let Some(kind) = EventKind::from_message(text) else {
        debug!(text, "ignoring unknown command");
        return;
    };
    let event = InboundEvent::new(TELEGRAM_CHANNEL, chat_id, user, kind);

    match inbound.publish(event).await {
        Ok(()) => base.record_received().await,
        Err(e) => error!(error = %e, "failed to publish telegram message to bus"),
    }
}

async fn handle_callback(bot: Bot, query: CallbackQuery, inbound: InboundHandle, base: Arc<ChannelBase>) {
    // Always answered, or the client keeps showing a spinner.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "failed to answer callback query");
    }

    let Some(selection) = query.data.as_deref().and_then(Selection::parse) else {
        debug!(data = ?query.data, "ignoring unknown callback data");
        return;
    };
    let Some(message) = query.message.as_ref() else {
        debug!("callback without message");
        return;
    };

    let event = InboundEvent::selection(
        TELEGRAM_CHANNEL,
        message.chat().id.0.to_string(),
        identity(&query.from),
        selection,
        Some(message.id().0.to_string()),
    );

    match inbound.publish(event).await {
        Ok(()) => base.record_received().await,
        Err(e) => error!(error = %e, "failed to publish telegram callback to bus"),
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let bot = Bot::new(&self.config.token);
        if let Err(e) = bot.get_me().await {
            self.base.set_state(ChannelState::Error).await;
            self.base.record_error(e.to_string()).await;
            return Err(ChannelError::start(format!("telegram rejected the token: {e}")));
        }

        let mut outbound_rx = bus.subscribe_channel(TELEGRAM_CHANNEL).await;
        let output = {
            let bot = bot.clone();
            let base = Arc::clone(&self.base);
            let max_len = self.config.max_message_length;
            tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    match deliver(&bot, &msg, max_len).await {
                        Ok(()) => base.record_sent().await,
                        Err(e) => base.record_error(e.to_string()).await,
                    }
                }
                debug!("Telegram output task finished");
            })
        };
        *self.output_task.write().await = Some(output);

        let message_handler = {
            let inbound = bus.inbound_handle();
            let base = Arc::clone(&self.base);
            Update::filter_message().endpoint(move |msg: Message| {
                let inbound = inbound.clone();
                let base = Arc::clone(&base);
                async move {
                    handle_message(msg, inbound, base).await;
                    Ok::<(), teloxide::RequestError>(())
                }
            })
        };

        let callback_handler = {
            let inbound = bus.inbound_handle();
            let base = Arc::clone(&self.base);
            Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
                let inbound = inbound.clone();
                let base = Arc::clone(&base);
                async move {
                    handle_callback(bot, query, inbound, base).await;
                    Ok::<(), teloxide::RequestError>(())
                }
            })
        };

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        let mut dispatcher = Dispatcher::builder(bot, handler).build();
        *self.shutdown.write().await = Some(dispatcher.shutdown_token());

        tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("Telegram channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        if let Some(token) = self.shutdown.write().await.take() {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(e) => debug!(error = %e, "dispatcher was not running"),
            }
        }
        if let Some(task) = self.output_task.write().await.take() {
            task.abort();
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("Telegram channel stopped");
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{Button, Selection};
    use teloxide::types::InlineKeyboardButtonKind;

    fn user(first_name: &str, username: Option<&str>) -> User {
        serde_json::from_value(serde_json::json!({
            "id": 42,
            "is_bot": false,
            "first_name": first_name,
            "username": username,
        }))
        .unwrap()
    }

    #[test]
    fn test_markdown_to_html() {
        assert_eq!(markdown_to_telegram_html("**bold**"), "<b>bold</b>");
        assert_eq!(markdown_to_telegram_html("*italic*"), "<i>italic</i>");
        assert_eq!(markdown_to_telegram_html("a *b* c"), "a <i>b</i> c");
        assert_eq!(markdown_to_telegram_html("`code`"), "<code>code</code>");
        assert_eq!(
            markdown_to_telegram_html("[text](https://example.com)"),
            r#"<a href="https://example.com">text</a>"#
        );
        assert_eq!(markdown_to_telegram_html("<script>"), "&lt;script&gt;");
    }

    #[test]
    fn test_markdown_leaves_snake_case() {
        assert_eq!(markdown_to_telegram_html("set_lvl_Beginner"), "set_lvl_Beginner");
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_split_keeps_long_bold_span_balanced() {
        let words = "word ".repeat(40);
        let html = markdown_to_telegram_html(&format!("**{}**", words.trim_end()));

        let chunks = split_html(&html, 64);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 64, "chunk too long: {chunk}");
            assert_eq!(count(chunk, "<b>"), 1, "{chunk}");
            assert_eq!(count(chunk, "</b>"), 1, "{chunk}");
            assert!(chunk.starts_with("<b>") && chunk.ends_with("</b>"));
        }
        let text: String = chunks.iter().map(|c| strip_tags(c)).collect();
        assert_eq!(text, words.trim_end());
    }

    #[test]
    fn test_split_prefers_line_breaks_and_keeps_entities() {
        let html = markdown_to_telegram_html("first line & more\nsecond *line*\nthird line");

        let chunks = split_html(&html, 32);

        assert_eq!(chunks[0], "first line &amp; more\n");
        assert!(chunks.iter().all(|c| c.len() <= 32));
        assert!(chunks.iter().all(|c| count(c, "<i>") == count(c, "</i>")));
        assert_eq!(chunks.concat(), html);
    }

    #[test]
    fn test_split_reopens_links() {
        let html = markdown_to_telegram_html(&format!("[{}](https://x.io)", "a".repeat(30)));

        let chunks = split_html(&html, 40);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with(r#"<a href="https://x.io">"#), "{chunk}");
            assert!(chunk.ends_with("</a>"));
        }
    }

    #[test]
    fn test_split_short_text_is_one_chunk() {
        assert_eq!(split_html("<b>hi</b>", 4096), ["<b>hi</b>"]);
        assert!(split_html("", 4096).is_empty());
    }

    #[test]
    fn test_keyboard_layout() {
        let menu = Menu {
            body: "x".to_string(),
            rows: vec![
                vec![
                    Button::new("A", Selection::ConfigLevel),
                    Button::new("B", Selection::ConfigScenario),
                ],
                vec![Button::new("C", Selection::BackMain)],
            ],
        };

        let markup = keyboard(&menu);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        match &markup.inline_keyboard[1][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "back_main"),
            other => panic!("unexpected button kind: {other:?}"),
        }
    }

    #[test]
    fn test_identity_uses_first_name() {
        let id = identity(&user("Ana", Some("ana_g")));
        assert_eq!(id.id, "42");
        assert_eq!(id.display_name, "Ana");

        assert_eq!(identity(&user(" ", Some("ana_g"))).display_name, "ana_g");
        assert_eq!(identity(&user("", None)).display_name, "42");
    }

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("-100123").unwrap(), ChatId(-100_123));
        assert!(parse_chat_id("cli").is_err());
    }

    #[test]
    fn test_config_debug_hides_token() {
        let config = TelegramChannelConfig::new("123:secret");
        assert!(!format!("{config:?}").contains("secret"));
        assert_eq!(config.max_message_length, 4096);
    }
}
