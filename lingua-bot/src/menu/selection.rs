//! Selection tokens carried by menu buttons.
//!
//! Tokens are strings of the form `prefix` or `prefix_payload`
//! (`start_chat`, `set_lvl_Beginner`, `set_sce_Coffee Shop`). They are decoded
//! once, at the transport boundary, into [`Selection`].

use crate::session::{Level, Scenario};
use serde::{Deserialize, Serialize};
use std::fmt;

const BACK_MAIN: &str = "back_main";
const CONFIG_LEVEL: &str = "config_level";
const CONFIG_SCENE: &str = "config_scene";
const START_CHAT: &str = "start_chat";
const GET_VOCAB: &str = "get_vocab";
const SET_LEVEL_PREFIX: &str = "set_lvl_";
const SET_SCENARIO_PREFIX: &str = "set_sce_";

/// A decoded menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Return to the main menu and stop practicing.
    BackMain,
    /// Open the level menu.
    ConfigLevel,
    /// Open the scenario menu.
    ConfigScenario,
    /// Start practicing.
    StartChat,
    /// Ask for vocabulary for the current scenario.
    Vocabulary,
    /// Pick a level.
    SetLevel(Level),
    /// Pick a scenario preset.
    SetScenario(Scenario),
}

impl Selection {
    /// Decode a token. Unknown tokens, and payloads outside the level and
    /// scenario catalogs, yield `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            BACK_MAIN => Some(Self::BackMain),
            CONFIG_LEVEL => Some(Self::ConfigLevel),
            CONFIG_SCENE => Some(Self::ConfigScenario),
            START_CHAT => Some(Self::StartChat),
            GET_VOCAB => Some(Self::Vocabulary),
            _ => {
                if let Some(label) = token.strip_prefix(SET_LEVEL_PREFIX) {
                    Level::from_label(label).map(Self::SetLevel)
                } else if let Some(label) = token.strip_prefix(SET_SCENARIO_PREFIX) {
                    Scenario::preset(label).map(Self::SetScenario)
                } else {
                    None
                }
            }
        }
    }

    /// Encode as a button token.
    #[must_use]
    pub fn token(self) -> String {
        match self {
            Self::BackMain => BACK_MAIN.to_string(),
            Self::ConfigLevel => CONFIG_LEVEL.to_string(),
            Self::ConfigScenario => CONFIG_SCENE.to_string(),
            Self::StartChat => START_CHAT.to_string(),
            Self::Vocabulary => GET_VOCAB.to_string(),
            Self::SetLevel(level) => format!("{SET_LEVEL_PREFIX}{}", level.label()),
            Self::SetScenario(scenario) => format!("{SET_SCENARIO_PREFIX}{}", scenario.label()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}
