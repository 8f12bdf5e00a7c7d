//! Learner profile: proficiency level, practice scenario and session mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proficiency level of the learner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Simple vocabulary, short sentences.
    #[default]
    Beginner,
    /// Everyday fluency with some gaps.
    Intermediate,
    /// Near-native register.
    Advanced,
}

impl Level {
    /// All levels, in menu order.
    pub const ALL: [Self; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// Label shown to the user and used in selection tokens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
        }
    }

    /// Look up a level by its label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.label() == label)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role-play context that frames the tutoring prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// Open-ended small talk; the initial scenario, not offered in the menu.
    #[default]
    GeneralConversation,
    /// Ordering at a coffee shop.
    CoffeeShop,
    /// Answering questions at a job interview.
    JobInterview,
    /// Checking in and getting around at an airport.
    Airport,
}

impl Scenario {
    /// Scenarios offered in the scenario menu.
    pub const PRESETS: [Self; 3] = [Self::CoffeeShop, Self::JobInterview, Self::Airport];

    /// Label shown to the user and used in selection tokens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::GeneralConversation => "General Conversation",
            Self::CoffeeShop => "Coffee Shop",
            Self::JobInterview => "Job Interview",
            Self::Airport => "Airport",
        }
    }

    /// Look up a selectable preset by its label.
    ///
    /// The default scenario is not part of the catalog and is never returned.
    #[must_use]
    pub fn preset(label: &str) -> Option<Self> {
        Self::PRESETS.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the learner is still configuring or actively practicing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Menus only; free text is redirected to the menu.
    #[default]
    Configuring,
    /// Free text goes to the tutor.
    Practicing,
}
