//! Chat history: an append-only, chronological list of turns.

use ai_llm_service::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turns of one session. Only whole exchanges are appended, so a
/// question never appears without its answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from existing exchanges `(question, answer)`.
    pub fn from_exchanges<Q, A>(pairs: impl IntoIterator<Item = (Q, A)>) -> Self
    where
        Q: Into<String>,
        A: Into<String>,
    {
        let mut h = Self::new();
        for (q, a) in pairs {
            h.push_exchange(q, a);
        }
        h
    }

    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The turns as model messages, oldest first.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| match t.role {
                Role::User => ChatMessage::user(t.content.clone()),
                Role::Assistant => ChatMessage::assistant(t.content.clone()),
            })
            .collect()
    }
}
