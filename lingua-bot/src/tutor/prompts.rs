//! Prompt templates and fixed user-facing replies.

use crate::session::{Level, Scenario};

/// Reply sent when the tutor could not answer a chat message.
pub const CHAT_APOLOGY: &str =
    "Lo siento, tuve un pequeño corto circuito. ¿Puedes repetir eso?";

/// Reply sent when the vocabulary list could not be generated.
pub const VOCABULARY_APOLOGY: &str =
    "Lo siento, no pude preparar el vocabulario ahora mismo. Inténtalo de nuevo en un momento.";

/// Values substituted into the templates.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    /// Learner's display name.
    pub name: &'a str,
    /// Learner's level.
    pub level: Level,
    /// Active scenario.
    pub scenario: Scenario,
    /// Language being practiced.
    pub target_language: &'a str,
    /// Language used for explanations.
    pub native_language: &'a str,
}

/// System prompt used before the learner has started practicing.
#[must_use]
pub fn redirect_prompt(vars: &PromptVars<'_>) -> String {
    format!(
        "You are the assistant of a {target} practice bot. The learner, {name}, has not \
started a practice session yet.

Reply briefly in {native}, in one or two sentences:
- Greet the learner by name.
- Explain that they can choose a level and a scenario in the menu, and press \
\"Empezar a practicar\" to begin.
- Remind them that /menu opens the menu.

Do not start a role-play and do not correct their {target} yet.",
        target = vars.target_language,
        native = vars.native_language,
        name = vars.name,
    )
}

/// System prompt for an active practice session.
///
/// The reply shape (answer, correction, follow-up) is only requested; it is
/// not checked.
#[must_use]
pub fn tutor_prompt(vars: &PromptVars<'_>) -> String {
    format!(
        "You are a friendly, expert {target} tutor. You are role-playing the scenario \
\"{scenario}\" with {name}, a learner whose level is {level}.

Adapt vocabulary and sentence length to the {level} level. Stay in the scenario.

Always answer with exactly these three parts:
1. Your reply, in {target}, continuing the role-play.
2. ✍️ Correction: if {name} made grammar or vocabulary mistakes, show the corrected \
sentence and explain briefly in {native}. If there were no mistakes, say so in one line.
3. 💬 Continue: one open question or suggestion in {target} that keeps the conversation \
going, followed by its translation into {native} in parentheses.",
        target = vars.target_language,
        native = vars.native_language,
        scenario = vars.scenario,
        name = vars.name,
        level = vars.level,
    )
}

/// System prompt for the one-shot vocabulary request.
#[must_use]
pub fn vocabulary_prompt(vars: &PromptVars<'_>) -> String {
    format!(
        "You are a {target} teacher preparing study material for a {level} learner. \
Explanations go in {native}. Be concise and use a numbered list.",
        target = vars.target_language,
        level = vars.level,
        native = vars.native_language,
    )
}

/// User message for the one-shot vocabulary request.
#[must_use]
pub fn vocabulary_request(vars: &PromptVars<'_>) -> String {
    format!(
        "Give me 5 useful {target} vocabulary items for the scenario \"{scenario}\". \
For each one include the word or phrase, its translation into {native}, and a short \
example sentence.",
        target = vars.target_language,
        scenario = vars.scenario,
        native = vars.native_language,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> PromptVars<'static> {
        PromptVars {
            name: "Ana",
            level: Level::Advanced,
            scenario: Scenario::Airport,
            target_language: "English",
            native_language: "Spanish",
        }
    }

    #[test]
    fn test_tutor_prompt_is_parameterized() {
        let prompt = tutor_prompt(&vars());
        assert!(prompt.contains("Ana"));
        assert!(prompt.contains("Advanced"));
        assert!(prompt.contains("\"Airport\""));
        assert!(prompt.contains("Correction"));
        assert!(prompt.contains("Continue"));
    }

    #[test]
    fn test_redirect_prompt_points_to_menu() {
        let prompt = redirect_prompt(&vars());
        assert!(prompt.contains("/menu"));
        assert!(!prompt.contains("role-playing"));
    }

    #[test]
    fn test_vocabulary_request_names_scenario() {
        assert!(vocabulary_request(&vars()).contains("5 useful English"));
        assert!(vocabulary_request(&vars()).contains("Airport"));
    }
}
