//! Per-user conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConversationTurn;

/// The ordered turn history for one user.
///
/// Turns are only ever appended; nothing in this type reorders or removes
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    pub user_id: String,
    turns: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create an empty conversation for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append turns to the end of the history, keeping their order.
    pub fn append<I>(&mut self, turns: I)
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        let before = self.turns.len();
        self.turns.extend(turns);
        if self.turns.len() != before {
            self.updated_at = Utc::now();
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_order() {
        let mut state = ConversationState::new("u1");
        assert!(state.is_empty());

        state.append([ConversationTurn::user("hi"), ConversationTurn::model("hello")]);
        state.append([ConversationTurn::user("how are you")]);

        let texts: Vec<&str> = state.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["hi", "hello", "how are you"]);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn empty_append_does_not_touch_timestamp() {
        let mut state = ConversationState::new("u1");
        let updated = state.updated_at;
        state.append(Vec::new());
        assert_eq!(state.updated_at, updated);
    }
}
