//! Menu rendering: body text plus button rows for each menu state.

use super::machine::MenuState;
use super::selection::Selection;
use crate::session::{Level, Scenario, Session};
use serde::{Deserialize, Serialize};

/// A single menu button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Text shown on the button.
    pub label: String,
    /// Token sent back when pressed.
    pub token: String,
}

impl Button {
    /// Create a button for a selection.
    pub fn new(label: impl Into<String>, selection: Selection) -> Self {
        Self {
            label: label.into(),
            token: selection.token(),
        }
    }
}

/// A rendered menu: Markdown body plus rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    /// Message body (Markdown).
    pub body: String,
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<Button>>,
}

impl Menu {
    /// All buttons in display order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

fn back_row() -> Vec<Button> {
    vec![Button::new("⬅️ Volver al menú", Selection::BackMain)]
}

/// Render the menu for `state` using the session's current profile.
#[must_use]
pub fn render(state: MenuState, session: &Session) -> Menu {
    match state {
        MenuState::Main => main_menu(session),
        MenuState::Level => level_menu(session.level()),
        MenuState::Scenario => scenario_menu(session.scenario()),
        MenuState::Practicing => practice_intro(session),
    }
}

fn main_menu(session: &Session) -> Menu {
    Menu {
        body: format!(
            "**Menú principal**\n\n\
             Hola, {name}. Esta es tu configuración actual:\n\
             • Nivel: **{level}**\n\
             • Escenario: **{scenario}**\n\n\
             ¿Qué quieres hacer?",
            name = session.display_name(),
            level = session.level(),
            scenario = session.scenario(),
        ),
        rows: vec![
            vec![
                Button::new("📊 Nivel", Selection::ConfigLevel),
                Button::new("🎭 Escenario", Selection::ConfigScenario),
            ],
            vec![Button::new("💬 Empezar a practicar", Selection::StartChat)],
            vec![Button::new("📚 Vocabulario", Selection::Vocabulary)],
        ],
    }
}

fn level_menu(current: Level) -> Menu {
    let mut rows: Vec<Vec<Button>> = Level::ALL
        .into_iter()
        .map(|level| vec![Button::new(level.label(), Selection::SetLevel(level))])
        .collect();
    rows.push(back_row());

    Menu {
        body: format!("**Elige tu nivel**\n\nNivel actual: **{current}**"),
        rows,
    }
}

fn scenario_menu(current: Scenario) -> Menu {
    let mut rows: Vec<Vec<Button>> = Scenario::PRESETS
        .into_iter()
        .map(|scenario| vec![Button::new(scenario.label(), Selection::SetScenario(scenario))])
        .collect();
    rows.push(back_row());

    Menu {
        body: format!(
            "**Elige un escenario**\n\nEscenario actual: **{current}**\n\
             Al cambiar de escenario se borra la conversación anterior."
        ),
        rows,
    }
}

fn practice_intro(session: &Session) -> Menu {
    Menu {
        body: format!(
            "**¡A practicar!**\n\n\
             Escenario: **{scenario}** · Nivel: **{level}**\n\
             Escríbeme un mensaje para empezar. Te responderé, corregiré tus \
             errores y te propondré cómo seguir la conversación.",
            scenario = session.scenario(),
            level = session.level(),
        ),
        rows: vec![back_row()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryStorage, SessionStore};

    async fn session() -> Session {
        SessionStore::new(MemoryStorage::new())
            .get_or_create("cli:me", "Ana")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_main_menu_shows_profile() {
        let menu = render(MenuState::Main, &session().await);
        assert!(menu.body.contains("Beginner"));
        assert!(menu.body.contains("General Conversation"));

        let tokens: Vec<_> = menu.buttons().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, ["config_level", "config_scene", "start_chat", "get_vocab"]);
    }

    #[tokio::test]
    async fn test_level_menu() {
        let menu = render(MenuState::Level, &session().await);
        let tokens: Vec<_> = menu.buttons().map(|b| b.token.as_str()).collect();
        assert_eq!(
            tokens,
            ["set_lvl_Beginner", "set_lvl_Intermediate", "set_lvl_Advanced", "back_main"]
        );
    }

    #[tokio::test]
    async fn test_scenario_menu() {
        let menu = render(MenuState::Scenario, &session().await);
        let labels: Vec<_> = menu.buttons().map(|b| b.label.as_str()).collect();
        assert_eq!(labels.len(), 4);
        assert_eq!(&labels[..3], ["Coffee Shop", "Job Interview", "Airport"]);
        assert_eq!(menu.rows.last().unwrap()[0].token, "back_main");
    }

    #[tokio::test]
    async fn test_practice_intro_has_only_back() {
        let menu = render(MenuState::Practicing, &session().await);
        let tokens: Vec<_> = menu.buttons().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, ["back_main"]);
    }
}
