//! Chat transcript, reactions, and the chat widget's view of them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use events::{ReactionAction, ReactionUpdate, WireMessage};
use serde::Serialize;

pub const TRANSCRIPT_CAPACITY: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    pub message_type: String,
    pub timestamp: i64,
    /// Emoji to the ids of users who reacted with it. Never holds an empty set.
    pub reactions: BTreeMap<String, BTreeSet<String>>,
}

impl From<WireMessage> for ChatMessage {
    fn from(wire: WireMessage) -> Self {
        let reactions = wire
            .reactions
            .into_iter()
            .map(|(emoji, users)| (emoji, users.into_iter().collect::<BTreeSet<_>>()))
            .filter(|(_, users)| !users.is_empty())
            .collect();
        Self {
            id: wire.id,
            user_id: wire.user_id,
            user_name: wire.user_name,
            message: wire.message,
            message_type: wire.message_type,
            timestamp: wire.timestamp,
            reactions,
        }
    }
}

impl ChatMessage {
    /// Add or withdraw one user's emoji. Returns whether anything changed.
    pub fn apply_reaction(&mut self, emoji: &str, user_id: &str, action: ReactionAction) -> bool {
        match action {
            ReactionAction::Add => self
                .reactions
                .entry(emoji.to_owned())
                .or_default()
                .insert(user_id.to_owned()),
            ReactionAction::Remove => {
                let Some(users) = self.reactions.get_mut(emoji) else {
                    return false;
                };
                let removed = users.remove(user_id);
                if users.is_empty() {
                    self.reactions.remove(emoji);
                }
                removed
            }
        }
    }

    #[must_use]
    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions.get(emoji).map_or(0, BTreeSet::len)
    }
}

/// The most recent messages, oldest evicted first.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(TRANSCRIPT_CAPACITY)
    }
}

impl Transcript {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append unless a message with the same id is already held.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if self.get(&message.id).is_some() {
            return false;
        }
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        true
    }

    /// Unknown message ids are a no-op.
    pub fn apply_reaction(&mut self, update: &ReactionUpdate) -> bool {
        self.messages
            .iter_mut()
            .find(|message| message.id == update.message_id)
            .is_some_and(|message| message.apply_reaction(&update.emoji, &update.user_id, update.action))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// =============================================================================
// TYPING
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypingUser {
    pub user_id: String,
    pub user_name: Option<String>,
}

/// "Ann is typing...", "Ann and Bob are typing...", "3 people are typing...".
#[must_use]
pub fn typing_line(names: &[&str]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{one} is typing...")),
        [one, two] => Some(format!("{one} and {two} are typing...")),
        many => Some(format!("{} people are typing...", many.len())),
    }
}

// =============================================================================
// VIEW
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionView {
    pub emoji: String,
    pub count: usize,
    pub reacted_by_me: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub user_name: String,
    pub message: String,
    pub timestamp: i64,
    pub own: bool,
    pub reactions: Vec<ReactionView>,
}

impl MessageView {
    #[must_use]
    pub fn new(message: &ChatMessage, me: &str) -> Self {
        Self {
            id: message.id.clone(),
            user_name: message.user_name.clone(),
            message: message.message.clone(),
            timestamp: message.timestamp,
            own: message.user_id == me,
            reactions: message
                .reactions
                .iter()
                .map(|(emoji, users)| ReactionView {
                    emoji: emoji.clone(),
                    count: users.len(),
                    reacted_by_me: users.contains(me),
                })
                .collect(),
        }
    }
}

/// Everything the chat widget renders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub messages: Vec<MessageView>,
    pub typing: Option<String>,
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
