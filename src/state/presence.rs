//! Reducer from the connection's event feed to application-visible state.
//!
//! DESIGN
//! ======
//! `PresenceStore` is the single writer of roster, transcript, and typing
//! state. It is a plain value driven by the caller's loop; the renderer and
//! chat widget read it and never mutate it.
//!
//! Events are tagged with the connection epoch that produced them. An event
//! from an older epoch is discarded. The first event of a newer epoch clears
//! per-connection state (typing indicators) before it is applied.

use std::collections::BTreeMap;
use std::time::Duration;

use events::InboundEvent;
use tracing::{debug, info, warn};

use super::chat::{ChatMessage, ChatView, MessageView, Transcript, TypingUser, typing_line};
use super::roster::{LocationOutcome, Roster};
use crate::net::{ClientEvent, ConnectionStatus};

/// Server notice awaiting display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerNotice {
    Shutdown(String),
    Error(String),
}

#[derive(Debug)]
pub struct PresenceStore {
    roster: Roster,
    transcript: Transcript,
    typing: BTreeMap<String, TypingUser>,
    epoch: u64,
    status: ConnectionStatus,
    latency: Option<Duration>,
    user_count: Option<u64>,
    confirmed_socket_id: Option<String>,
    notice: Option<ServerNotice>,
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new(Roster::default())
    }
}

impl PresenceStore {
    #[must_use]
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            transcript: Transcript::default(),
            typing: BTreeMap::new(),
            epoch: 0,
            status: ConnectionStatus::Disconnected,
            latency: None,
            user_count: None,
            confirmed_socket_id: None,
            notice: None,
        }
    }

    #[must_use]
    pub fn with_trail_capacity(trail_capacity: usize) -> Self {
        Self::new(Roster::new(trail_capacity))
    }

    /// Apply one event from the connection manager. Returns false when it was stale.
    pub fn apply(&mut self, event: &ClientEvent) -> bool {
        match event {
            ClientEvent::Status { status, epoch } => {
                if !self.enter_epoch(*epoch) {
                    return false;
                }
                self.status = *status;
                match status {
                    ConnectionStatus::Connected => {}
                    ConnectionStatus::Disconnected => {
                        self.typing.clear();
                        self.roster.clear();
                        self.user_count = None;
                        self.confirmed_socket_id = None;
                    }
                    ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {
                        self.typing.clear();
                        self.confirmed_socket_id = None;
                    }
                }
                true
            }
            ClientEvent::Latency(latency) => {
                self.latency = *latency;
                true
            }
            ClientEvent::Inbound { epoch, event } => {
                if !self.enter_epoch(*epoch) {
                    return false;
                }
                self.apply_inbound(event);
                true
            }
        }
    }

    fn enter_epoch(&mut self, epoch: u64) -> bool {
        if epoch < self.epoch {
            debug!(epoch, current = self.epoch, "discarding event from a stale connection");
            return false;
        }
        if epoch > self.epoch {
            self.epoch = epoch;
            self.typing.clear();
        }
        true
    }

    /// Reduce one server event. Returns whether visible state changed.
    pub fn apply_inbound(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::UsersList(users) => {
                self.roster.replace(users.clone());
                self.typing.retain(|id, _| self.roster.contains(id));
                true
            }
            InboundEvent::UserJoined(user) => self.roster.insert_if_absent(user.clone()),
            InboundEvent::UserLeft(left) => {
                let removed = self.roster.remove(&left.user_id).is_some();
                let was_typing = self.typing.remove(&left.user_id).is_some();
                removed || was_typing
            }
            InboundEvent::UserUpdated(patch) => self.roster.apply_patch(patch),
            InboundEvent::UserCount(count) => {
                self.user_count = Some(count.count);
                true
            }
            InboundEvent::UserTyping(typing) => {
                if typing.is_typing {
                    let entry = TypingUser {
                        user_id: typing.user_id.clone(),
                        user_name: typing.user_name.clone(),
                    };
                    self.typing.insert(typing.user_id.clone(), entry);
                    true
                } else {
                    self.typing.remove(&typing.user_id).is_some()
                }
            }
            InboundEvent::LocationUpdate(update) => {
                self.roster.apply_location(update) == LocationOutcome::Applied
            }
            InboundEvent::NewMessage(message) => {
                let pushed = self.transcript.push(ChatMessage::from(message.clone()));
                if !pushed {
                    debug!(message_id = %message.id, "duplicate message ignored");
                }
                pushed
            }
            InboundEvent::MessageReactionUpdate(update) => self.transcript.apply_reaction(update),
            InboundEvent::UserStatusChanged(change) => {
                self.roster.set_status(&change.user_id, change.status)
            }
            InboundEvent::UserPresenceChanged(change) => self.roster.set_presence(change),
            InboundEvent::Pong(_) => false,
            InboundEvent::ConnectionConfirmed(confirmed) => {
                if let Some(message) = &confirmed.message {
                    info!(%message, "connection confirmed");
                }
                self.confirmed_socket_id.clone_from(&confirmed.socket_id);
                true
            }
            InboundEvent::ServerShutdown(notice) => {
                warn!(message = %notice.message, "server shutdown notice");
                self.notice = Some(ServerNotice::Shutdown(notice.message.clone()));
                true
            }
            InboundEvent::Error(notice) => {
                warn!(message = %notice.message, "server error notice");
                self.notice = Some(ServerNotice::Error(notice.message.clone()));
                true
            }
        }
    }

    /// Chat widget data as seen by user `me`.
    #[must_use]
    pub fn chat_view(&self, me: &str) -> ChatView {
        let names: Vec<&str> = self
            .typing
            .values()
            .filter(|typing| typing.user_id != me)
            .map(|typing| self.display_name(typing))
            .collect();
        ChatView {
            messages: self
                .transcript
                .iter()
                .map(|message| MessageView::new(message, me))
                .collect(),
            typing: typing_line(&names),
        }
    }

    fn display_name<'a>(&'a self, typing: &'a TypingUser) -> &'a str {
        typing
            .user_name
            .as_deref()
            .or_else(|| self.roster.get(&typing.user_id).map(|user| user.name.as_str()))
            .unwrap_or("Someone")
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn typing(&self) -> impl Iterator<Item = &TypingUser> {
        self.typing.values()
    }

    #[must_use]
    pub fn is_typing(&self, user_id: &str) -> bool {
        self.typing.contains_key(user_id)
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    #[must_use]
    pub fn user_count(&self) -> Option<u64> {
        self.user_count
    }

    #[must_use]
    pub fn confirmed_socket_id(&self) -> Option<&str> {
        self.confirmed_socket_id.as_deref()
    }

    /// Take the pending server notice, if any.
    pub fn take_notice(&mut self) -> Option<ServerNotice> {
        self.notice.take()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
