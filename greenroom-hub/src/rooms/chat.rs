use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::UserId;

/// A chat message admitted into a room.
///
/// Immutable once admitted; banning the sender afterwards never retracts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Monotonic per room, assigned at admission
    pub id: u64,
    pub sender_id: UserId,
    pub sender_display_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// An entry in a room's ban set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub user_id: UserId,
    pub banned_by: UserId,
    pub banned_at: DateTime<Utc>,
}

/// The bounded, most-recent-last chat backlog of a room
#[derive(Debug)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    next_id: u64,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            next_id: 1,
            capacity,
        }
    }

    /// Appends an admitted message, dropping the oldest one when full
    pub fn push(&mut self, sender_id: UserId, sender_display_name: String, text: String) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_id,
            sender_id,
            sender_display_name,
            text,
            sent_at: Utc::now(),
        };

        self.next_id += 1;

        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }

        self.messages.push_back(message.clone());
        message
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_get_monotonic_ids() {
        let mut log = ChatLog::new(10);

        let first = log.push("u1".into(), "User 1".into(), "one".into());
        let second = log.push("u2".into(), "User 2".into(), "two".into());

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn the_backlog_drops_the_oldest_message() {
        let mut log = ChatLog::new(2);

        log.push("u1".into(), "User 1".into(), "one".into());
        log.push("u1".into(), "User 1".into(), "two".into());
        log.push("u1".into(), "User 1".into(), "three".into());

        let texts: Vec<_> = log.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }
}
