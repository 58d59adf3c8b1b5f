//! # Chat memory
//!
//! A rolling window over the conversation. Each user question and each
//! completed assistant answer is one [`Turn`]; the window keeps the most
//! recent `max_messages` of them and evicts the oldest first.
//!
//! Eviction is by count, not by tokens, so the prompt always carries the same
//! shape of history regardless of how long individual answers were.
//!
//! ## Quick start
//! ```rust
//! use rag_chatbot::memory::{MessageWindowMemory, Role, Turn};
//!
//! let mut memory = MessageWindowMemory::new(2);
//! memory.add(Turn::user("Where did Milton land?"));
//! memory.add(Turn::assistant("Near Siesta Key."));
//! memory.add(Turn::user("When?"));
//!
//! let window = memory.messages();
//! assert_eq!(window.len(), 2);
//! assert_eq!(window[0].role, Role::Assistant);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// FIFO window holding at most `max_messages` turns (oldest at the front).
#[derive(Debug, Clone)]
pub struct MessageWindowMemory {
    turns: VecDeque<Turn>,
    max_messages: usize,
}

impl MessageWindowMemory {
    /// Create an empty window. A size of zero is treated as one.
    pub fn new(max_messages: usize) -> Self {
        let max_messages = max_messages.max(1);
        Self {
            turns: VecDeque::with_capacity(max_messages + 1),
            max_messages,
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Append a turn, evicting from the front until the window fits.
    pub fn add(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_messages {
            if let Some(evicted) = self.turns.pop_front() {
                trace!("Evicted {:?} turn from chat memory", evicted.role);
            }
        }
    }

    /// Record a completed exchange.
    pub fn add_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.add(Turn::user(user));
        self.add(Turn::assistant(assistant));
    }

    /// The retained turns, oldest first.
    pub fn messages(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut memory = MessageWindowMemory::new(3);
        for i in 1..=5 {
            memory.add(Turn::user(format!("q{i}")));
        }
        let contents: Vec<_> = memory.messages().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["q3", "q4", "q5"]);
    }

    #[test]
    fn test_window_never_exceeds_size() {
        let mut memory = MessageWindowMemory::new(4);
        for i in 0..20 {
            memory.add_exchange(format!("u{i}"), format!("a{i}"));
            assert!(memory.len() <= 4);
        }
        assert_eq!(memory.len(), 4);
    }

    #[test]
    fn test_window_two_keeps_last_exchange() {
        let mut memory = MessageWindowMemory::new(2);
        memory.add_exchange("U1", "A1");
        memory.add_exchange("U2", "A2");
        assert_eq!(
            memory.messages(),
            vec![Turn::user("U2"), Turn::assistant("A2")]
        );
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let mut memory = MessageWindowMemory::new(0);
        memory.add(Turn::user("only"));
        memory.add(Turn::user("latest"));
        assert_eq!(memory.max_messages(), 1);
        assert_eq!(memory.messages(), vec![Turn::user("latest")]);
    }
}
