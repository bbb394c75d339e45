use chrono::{DateTime, Utc};
use robo_llm::provider::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ConversationType;

/// A conversation message stamped with the time it was appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub body: ChatMessage,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(body: ChatMessage) -> Self {
        Self { body, timestamp: Utc::now() }
    }

    pub fn role(&self) -> Role {
        self.body.role()
    }
}

/// One purpose-tagged exchange with the oracle. Message order is the literal
/// context window sent to the oracle. Closed conversations reject appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationType,
    messages: Vec<Message>,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(kind: ConversationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            messages: Vec::new(),
            start_time: Utc::now(),
            finish_time: None,
        }
    }

    /// Append a message. Returns false when the conversation is already closed.
    pub fn push(&mut self, body: ChatMessage) -> bool {
        if self.is_finished() {
            tracing::warn!(conversation = %self.id, kind = ?self.kind, "append to closed conversation ignored");
            return false;
        }
        self.messages.push(Message::new(body));
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Message bodies in order, ready to send to the oracle.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(|m| m.body.clone()).collect()
    }

    /// Close the conversation. Only the first call sets the finish time.
    pub fn finish(&mut self) {
        if self.finish_time.is_none() {
            self.finish_time = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }
}

/// Session-wide audit trail of closed conversations.
#[derive(Debug, Default)]
pub struct ConversationLog {
    conversations: Vec<Conversation>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the conversation and append it to the log.
    pub fn record(&mut self, mut conversation: Conversation) {
        conversation.finish();
        tracing::debug!(
            conversation = %conversation.id,
            kind = ?conversation.kind,
            messages = conversation.messages.len(),
            "conversation recorded"
        );
        self.conversations.push(conversation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn last(&self) -> Option<&Conversation> {
        self.conversations.last()
    }

    pub fn count_of(&self, kind: ConversationType) -> usize {
        self.conversations.iter().filter(|c| c.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_conversation_is_immutable() {
        let mut conversation = Conversation::new(ConversationType::Chat);
        assert!(conversation.push(ChatMessage::user("hello")));
        conversation.finish();
        let finished_at = conversation.finish_time;
        assert!(!conversation.push(ChatMessage::assistant("late")));
        conversation.finish();
        assert_eq!(conversation.finish_time, finished_at);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn chat_messages_preserve_order() {
        let mut conversation = Conversation::new(ConversationType::Labelling);
        conversation.push(ChatMessage::system("label it"));
        conversation.push(ChatMessage::user("Pick up the cup."));
        let roles: Vec<_> = conversation.messages().iter().map(Message::role).collect();
        assert_eq!(roles, [Role::System, Role::User]);
        assert_eq!(conversation.chat_messages()[1], ChatMessage::user("Pick up the cup."));
    }

    #[test]
    fn log_records_and_closes() {
        let mut log = ConversationLog::new();
        log.record(Conversation::new(ConversationType::Deciding));
        log.record(Conversation::new(ConversationType::Acting));
        log.record(Conversation::new(ConversationType::Deciding));
        assert_eq!(log.len(), 3);
        assert_eq!(log.count_of(ConversationType::Deciding), 2);
        assert!(log.iter().all(Conversation::is_finished));
    }
}
