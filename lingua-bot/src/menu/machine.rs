//! Menu state machine.
//!
//! [`transition`] is the single source of truth for menu navigation. It is
//! pure: it returns the next state and the effects to apply, and the caller
//! applies them to the session.

use super::selection::Selection;
use crate::session::{Level, Mode, Scenario};
use serde::{Deserialize, Serialize};

/// Which menu the learner is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuState {
    /// Main menu: shows the profile and the available actions.
    #[default]
    Main,
    /// Level picker.
    Level,
    /// Scenario picker.
    Scenario,
    /// Practicing; only "back" is available.
    Practicing,
}

/// A session mutation requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Change the mode.
    SetMode(Mode),
    /// Change the level.
    SetLevel(Level),
    /// Change the scenario (and drop its history).
    SetScenario(Scenario),
    /// Run the one-shot vocabulary request and show the result.
    FetchVocabulary,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State to move to.
    pub next: MenuState,
    /// Effects to apply, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    const fn to(next: MenuState) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Compute the transition for `selection` in `state`.
///
/// Returns `None` when the selection is not valid in the current state; the
/// caller ignores it.
#[must_use]
pub fn transition(state: MenuState, selection: Selection) -> Option<Transition> {
    use MenuState as S;

    let result = match (state, selection) {
        (_, Selection::BackMain) => {
            Transition::to(S::Main).with_effect(Effect::SetMode(Mode::Configuring))
        }
        (S::Main, Selection::ConfigLevel) => Transition::to(S::Level),
        (S::Main, Selection::ConfigScenario) => Transition::to(S::Scenario),
        (S::Main, Selection::StartChat) => {
            Transition::to(S::Practicing).with_effect(Effect::SetMode(Mode::Practicing))
        }
        (S::Main, Selection::Vocabulary) => {
            Transition::to(S::Main).with_effect(Effect::FetchVocabulary)
        }
        (S::Level, Selection::SetLevel(level)) => {
            Transition::to(S::Main).with_effect(Effect::SetLevel(level))
        }
        (S::Scenario, Selection::SetScenario(scenario)) => {
            Transition::to(S::Main).with_effect(Effect::SetScenario(scenario))
        }
        _ => return None,
    };

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [MenuState; 4] = [
        MenuState::Main,
        MenuState::Level,
        MenuState::Scenario,
        MenuState::Practicing,
    ];

    #[test]
    fn test_back_main_from_anywhere() {
        for state in ALL_STATES {
            let t = transition(state, Selection::BackMain).unwrap();
            assert_eq!(t.next, MenuState::Main);
            assert_eq!(t.effects, vec![Effect::SetMode(Mode::Configuring)]);
        }
    }

    #[test]
    fn test_main_menu_rows() {
        let t = transition(MenuState::Main, Selection::ConfigLevel).unwrap();
        assert_eq!(t, Transition::to(MenuState::Level));

        let t = transition(MenuState::Main, Selection::ConfigScenario).unwrap();
        assert_eq!(t, Transition::to(MenuState::Scenario));

        let t = transition(MenuState::Main, Selection::StartChat).unwrap();
        assert_eq!(t.next, MenuState::Practicing);
        assert_eq!(t.effects, vec![Effect::SetMode(Mode::Practicing)]);

        let t = transition(MenuState::Main, Selection::Vocabulary).unwrap();
        assert_eq!(t.next, MenuState::Main);
        assert_eq!(t.effects, vec![Effect::FetchVocabulary]);
    }

    #[test]
    fn test_pickers() {
        let t = transition(MenuState::Level, Selection::SetLevel(Level::Advanced)).unwrap();
        assert_eq!(t.next, MenuState::Main);
        assert_eq!(t.effects, vec![Effect::SetLevel(Level::Advanced)]);

        let t = transition(MenuState::Scenario, Selection::SetScenario(Scenario::Airport)).unwrap();
        assert_eq!(t.next, MenuState::Main);
        assert_eq!(t.effects, vec![Effect::SetScenario(Scenario::Airport)]);
    }

    #[test]
    fn test_rows_outside_table_are_ignored() {
        assert!(transition(MenuState::Main, Selection::SetLevel(Level::Advanced)).is_none());
        assert!(transition(MenuState::Level, Selection::SetScenario(Scenario::Airport)).is_none());
        assert!(transition(MenuState::Scenario, Selection::StartChat).is_none());
        assert!(transition(MenuState::Practicing, Selection::ConfigLevel).is_none());
        assert!(transition(MenuState::Practicing, Selection::Vocabulary).is_none());
    }
}
