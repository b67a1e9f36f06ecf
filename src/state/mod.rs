//! Presence and messaging state.
//!
//! DESIGN
//! ======
//! A pure reducer over the inbound event stream. `roster` holds participants
//! and their trails, `chat` holds the transcript, reactions, and the chat
//! widget's view, and `presence` ties both to the connection's epochs.

mod chat;
mod presence;
mod roster;

pub use chat::{
    ChatMessage, ChatView, MessageView, ReactionView, TRANSCRIPT_CAPACITY, Transcript, TypingUser,
    typing_line,
};
pub use presence::{PresenceStore, ServerNotice};
pub use roster::{
    DEFAULT_TRAIL_CAPACITY, Location, LocationOutcome, Roster, Trail, TrailError, TrailPoint, User,
};
