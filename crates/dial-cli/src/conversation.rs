//! Conversation transcript

use dial_core::Message;

/// Ordered messages exchanged in one chat session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Remove the most recent message
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop()
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
    use dial_core::Role;

    #[test]
    fn test_keeps_order() {
        let mut conversation = Conversation::new();
        conversation.add_message(Message::system("s"));
        conversation.add_message(Message::user("u"));
        conversation.add_message(Message::assistant("a"));

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_pop() {
        let mut conversation = Conversation::new();
        assert!(conversation.pop().is_none());

        conversation.add_message(Message::user("u"));
        assert_eq!(conversation.pop(), Some(Message::user("u")));
        assert!(conversation.is_empty());
    }
}
