//! Per-chat conversation state for the currency flows.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::currency_model::CurrencyCode;

/// Words that abort whatever flow the chat is in
pub const CANCEL_WORDS: &[&str] = &["отмена", "стоп", "cancel", "выход", "начать", "/cancel"];

/// Represents the conversation state of a single chat
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingNewCurrencyCode,
    AwaitingNewCurrencyRate {
        code: CurrencyCode,
    },
    AwaitingConvertCode,
    AwaitingConvertAmount {
        code: CurrencyCode,
    },
    AwaitingUpdatedRate {
        code: CurrencyCode,
    },
}

impl ChatState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ChatState::Idle)
    }
}

/// Type alias for the currency dialogue
pub type CurrencyDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;

/// Whether the text asks to abort the current flow
pub fn is_cancel_command(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    CANCEL_WORDS.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_words() {
        assert!(is_cancel_command("Отмена"));
        assert!(is_cancel_command("  CANCEL "));
        assert!(is_cancel_command("стоп"));
        assert!(is_cancel_command("/cancel"));
        assert!(!is_cancel_command("USD"));
        assert!(!is_cancel_command("cancel please"));
    }

    #[test]
    fn test_default_state_is_idle() {
        assert!(ChatState::default().is_idle());
        assert!(!ChatState::AwaitingConvertCode.is_idle());
    }
}
