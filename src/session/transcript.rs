//! Chat transcript
//!
//! Ordered, append-only message log. At most one entry (the assistant reply
//! being streamed) is mutable at a time; every other entry is frozen the
//! moment it is appended.

use crate::types::message::{Message, Role};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    open_reply: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished message
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Append the single mutable entry: an empty assistant reply that
    /// streamed text accumulates into. Ignored if one is already open.
    pub fn open_reply(&mut self) {
        if self.open_reply {
            return;
        }
        self.messages.push(Message::new(Role::Assistant, ""));
        self.open_reply = true;
    }

    /// Append streamed text to the open reply
    ///
    /// Returns false when no reply is open (the delta is dropped).
    pub fn extend_reply(&mut self, delta: &str) -> bool {
        if !self.open_reply {
            return false;
        }
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(delta);
            return true;
        }
        false
    }

    /// Freeze the open reply; it is immutable from here on
    pub fn seal_reply(&mut self) {
        self.open_reply = false;
    }

    pub fn has_open_reply(&self) -> bool {
        self.open_reply
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
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
    fn test_insertion_order_is_display_order() {
        let mut t = Transcript::new();
        t.push(Role::User, "one");
        t.push(Role::Assistant, "two");
        t.push(Role::System, "three");
        let contents: Vec<&str> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_open_reply_starts_empty() {
        let mut t = Transcript::new();
        t.open_reply();
        assert!(t.has_open_reply());
        assert_eq!(t.last().map(|m| m.content.as_str()), Some(""));
        assert_eq!(t.last().map(|m| m.role), Some(Role::Assistant));
    }

    #[test]
    fn test_reply_accumulates_in_order() {
        let mut t = Transcript::new();
        t.open_reply();
        assert!(t.extend_reply("Hi"));
        assert_eq!(t.last().map(|m| m.content.as_str()), Some("Hi"));
        assert!(t.extend_reply(" there"));
        assert_eq!(t.last().map(|m| m.content.as_str()), Some("Hi there"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_extend_without_open_reply_is_dropped() {
        let mut t = Transcript::new();
        t.push(Role::Assistant, "done");
        assert!(!t.extend_reply("more"));
        assert_eq!(t.last().map(|m| m.content.as_str()), Some("done"));
    }

    #[test]
    fn test_sealed_reply_is_immutable() {
        let mut t = Transcript::new();
        t.open_reply();
        t.extend_reply("partial");
        t.seal_reply();
        assert!(!t.has_open_reply());
        assert!(!t.extend_reply(" more"));
        assert_eq!(t.last().map(|m| m.content.as_str()), Some("partial"));
    }

    #[test]
    fn test_at_most_one_open_reply() {
        let mut t = Transcript::new();
        t.open_reply();
        t.open_reply();
        assert_eq!(t.len(), 1);
    }
}
