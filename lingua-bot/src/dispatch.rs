//! Event dispatch.
//!
//! Routes each inbound event to the menu machine or the tutor engine while
//! holding the sender's [`SessionLease`](crate::session::SessionLease), and
//! returns the messages to render.

use crate::completion::CompletionProvider;
use crate::error::Result;
use crate::events::{Command, EventKind, InboundEvent, MessageFormat, OutboundMessage};
use crate::menu::{Effect, MenuState, Selection, render, transition};
use crate::session::{Session, SessionStore};
use crate::tutor::TutorEngine;
use crate::util::truncate_str;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns inbound events into outbound messages.
#[derive(Debug)]
pub struct Dispatcher<P> {
    store: Arc<SessionStore>,
    engine: TutorEngine<P>,
}

impl<P: CompletionProvider> Dispatcher<P> {
    /// Create a dispatcher.
    pub const fn new(store: Arc<SessionStore>, engine: TutorEngine<P>) -> Self {
        Self { store, engine }
    }

    /// The session store.
    #[must_use]
    pub const fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one event. Same-user events are processed one at a time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session store fails; provider failures
    /// are turned into apology messages.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Vec<OutboundMessage>> {
        let key = event.session_key();
        let mut session = self.store.acquire(&key, &event.user.display_name).await?;

        debug!(
            session = %key,
            menu = ?session.menu(),
            mode = ?session.mode(),
            "dispatching event"
        );

        let replies = match &event.kind {
            EventKind::Command(command) => Self::on_command(&mut session, event, *command),
            EventKind::Selection {
                selection,
                message_ref,
            } => {
                self.on_selection(&mut session, event, *selection, message_ref.as_deref())
                    .await
            }
            EventKind::Text(text) => {
                debug!(session = %key, text = %truncate_str(text, 60), "tutor turn");
                let reply = self.engine.respond(&mut session, text).await;
                vec![OutboundMessage::text(event, reply, MessageFormat::Markdown)]
            }
        };

        self.store.save(&mut session).await?;
        Ok(replies)
    }

    fn on_command(session: &mut Session, event: &InboundEvent, command: Command) -> Vec<OutboundMessage> {
        debug!(session = %session.key(), ?command, "command");
        session.set_menu(MenuState::Main);
        vec![OutboundMessage::menu(event, render(MenuState::Main, session))]
    }

    async fn on_selection(
        &self,
        session: &mut Session,
        event: &InboundEvent,
        selection: Selection,
        message_ref: Option<&str>,
    ) -> Vec<OutboundMessage> {
        let Some(step) = transition(session.menu(), selection) else {
            debug!(
                session = %session.key(),
                menu = ?session.menu(),
                %selection,
                "selection not valid here, ignoring"
            );
            return Vec::new();
        };

        let mut vocabulary = None;
        for effect in step.effects {
            match effect {
                Effect::SetMode(mode) => session.set_mode(mode),
                Effect::SetLevel(level) => session.set_level(level),
                Effect::SetScenario(scenario) => session.set_scenario(scenario),
                Effect::FetchVocabulary => {
                    vocabulary = Some(self.engine.vocabulary(session).await);
                }
            }
        }
        session.set_menu(step.next);
        info!(
            session = %session.key(),
            %selection,
            menu = ?step.next,
            "menu transition"
        );

        let menu = render(step.next, session);
        match (vocabulary, message_ref) {
            (Some(text), _) => vec![
                OutboundMessage::text(event, text, MessageFormat::Markdown),
                OutboundMessage::menu(event, menu),
            ],
            (None, Some(message_ref)) => vec![OutboundMessage::edit_menu(event, message_ref, menu)],
            (None, None) => vec![OutboundMessage::menu(event, menu)],
        }
    }
}
