//! Conversation history kept by an engine across instructions
//!
//! Only finished instructions and their final answers are kept; the per-run
//! tool observations live in the loop state.

use std::collections::VecDeque;

use crate::core::Message;

/// Bounded instruction/answer history
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: VecDeque<Message>,
    max_length: usize,
}

impl Conversation {
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_length,
        }
    }

    /// Remember a finished instruction and how it ended
    pub fn add_exchange(&mut self, instruction: impl Into<String>, answer: impl Into<String>) {
        self.add_message(Message::user(instruction));
        self.add_message(Message::assistant(answer));
    }

    fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);

        while self.messages.len() > self.max_length {
            self.messages.pop_front();
        }
    }

    /// History to prepend to the next run
    pub fn history(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(20)
    }
}
