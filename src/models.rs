// src/models.rs

use chrono::{DateTime, Utc};

/// Who a message in the scrollback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn css_class(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// Represents a message in the scrollback. `text` is markdown source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }
}

/// A message together with the HTML last rendered from its full text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub message: Message,
    pub html: String,
}

/// One record per finished exchange.
#[derive(Debug)]
pub struct ExchangeLog {
    pub timestamp: DateTime<Utc>,
    pub exchange_id: u64,
    pub endpoint: String,
    pub question_chars: usize,
    pub chunk_count: usize,
    pub answer_chars: usize,
    pub outcome: String,
    pub elapsed_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_the_sender() {
        let question = Message::user("why?");
        let answer = Message::assistant("because");

        assert_eq!(question.sender.css_class(), "user");
        assert_eq!(answer.sender.css_class(), "assistant");
        assert_eq!(answer.text, "because");
        assert!(answer.timestamp >= question.timestamp);
    }
}
