//! Chat Log
//!
//! Received chat lines with their arrival time. Only recent lines are shown.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// How long a line stays on screen.
pub const MESSAGE_LIFETIME_SECS: i64 = 5;

/// Lines kept before the oldest are discarded.
pub const MAX_HISTORY: usize = 128;

/// One received chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Text as relayed, sender name included.
    pub text: String,
    /// When this client received it.
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Age relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.received_at
    }
}

/// Chat history, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line received at `at`.
    pub fn push_at(&mut self, text: impl Into<String>, at: DateTime<Utc>) {
        if self.messages.len() == MAX_HISTORY {
            self.messages.pop_front();
        }
        self.messages.push_back(ChatMessage {
            text: text.into(),
            received_at: at,
        });
    }

    /// Record a line received now.
    pub fn push(&mut self, text: impl Into<String>) {
        self.push_at(text, Utc::now());
    }

    /// Lines received within the last five seconds, newest first.
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<&ChatMessage> {
        let lifetime = Duration::seconds(MESSAGE_LIFETIME_SECS);
        self.messages
            .iter()
            .rev()
            .take_while(|m| m.age(now) <= lifetime)
            .collect()
    }

    /// Every retained line, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
