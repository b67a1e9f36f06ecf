use super::*;
use events::{
    LatLng, LocationBroadcast, Notice, ReactionAction, ReactionUpdate, Role, UserCount, UserLeft,
    UserStatus, UserTyping, WireMessage, WireTrailPoint, WireUser,
};

fn wire_user(id: &str, name: &str) -> WireUser {
    WireUser {
        id: id.to_owned(),
        name: name.to_owned(),
        role: Role::Worker,
        status: UserStatus::Online,
        location: Some(LatLng::new(40.0, -105.0)),
        accuracy: None,
        heading: None,
        speed: None,
        last_seen: None,
        trail: Vec::new(),
    }
}

fn inbound(epoch: u64, event: InboundEvent) -> ClientEvent {
    ClientEvent::Inbound { epoch, event }
}

fn status(epoch: u64, status: ConnectionStatus) -> ClientEvent {
    ClientEvent::Status { status, epoch }
}

fn typing(user_id: &str, name: Option<&str>, is_typing: bool) -> InboundEvent {
    InboundEvent::UserTyping(UserTyping {
        user_id: user_id.to_owned(),
        user_name: name.map(str::to_owned),
        is_typing,
    })
}

fn connected_store() -> PresenceStore {
    let mut store = PresenceStore::default();
    store.apply(&status(1, ConnectionStatus::Connecting));
    store.apply(&status(1, ConnectionStatus::Connected));
    store
}

#[test]
fn user_left_removes_entry_and_typing_together() {
    let mut store = connected_store();
    let mut u3 = wire_user("u3", "Cy");
    u3.trail = vec![
        WireTrailPoint { latitude: 40.0, longitude: -105.0, timestamp: 1 },
        WireTrailPoint { latitude: 40.1, longitude: -105.0, timestamp: 2 },
    ];
    store.apply(&inbound(1, InboundEvent::UserJoined(u3)));
    store.apply(&inbound(1, typing("u3", Some("Cy"), true)));
    assert!(store.is_typing("u3"));

    assert!(store.apply_inbound(&InboundEvent::UserLeft(UserLeft {
        user_id: "u3".to_owned()
    })));

    assert!(!store.roster().contains("u3"));
    assert!(!store.is_typing("u3"));
}

#[test]
fn users_list_replaces_the_roster() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::UserJoined(wire_user("old", "Old")));
    store.apply_inbound(&InboundEvent::UsersList(vec![
        wire_user("u1", "Ann"),
        wire_user("u2", "Bob"),
    ]));

    let ids: Vec<&str> = store.roster().iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
}

#[test]
fn location_for_unknown_user_cannot_resurrect_it() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::UserJoined(wire_user("u1", "Ann")));
    store.apply_inbound(&InboundEvent::UserLeft(UserLeft {
        user_id: "u1".to_owned(),
    }));

    let late = InboundEvent::LocationUpdate(LocationBroadcast {
        user_id: "u1".to_owned(),
        location: LatLng::new(41.0, -106.0),
        accuracy: None,
        speed: None,
        heading: None,
        timestamp: 10,
    });
    assert!(!store.apply_inbound(&late));
    assert!(store.roster().is_empty());
}

#[test]
fn stale_epoch_events_are_discarded() {
    let mut store = connected_store();
    store.apply(&inbound(1, typing("u1", Some("Ann"), true)));

    store.apply(&status(1, ConnectionStatus::Reconnecting));
    assert!(!store.is_typing("u1"));
    store.apply(&status(2, ConnectionStatus::Connecting));

    assert!(!store.apply(&inbound(1, typing("u2", Some("Bob"), true))));
    assert!(!store.apply(&status(1, ConnectionStatus::Connected)));
    assert!(!store.is_typing("u2"));
    assert_eq!(store.status(), ConnectionStatus::Connecting);
    assert_eq!(store.epoch(), 2);
}

#[test]
fn first_event_of_new_epoch_clears_typing() {
    let mut store = connected_store();
    store.apply(&inbound(1, typing("u1", Some("Ann"), true)));

    store.apply(&inbound(2, typing("u2", Some("Bob"), true)));
    assert!(!store.is_typing("u1"));
    assert!(store.is_typing("u2"));
}

#[test]
fn disconnect_clears_ephemeral_state_and_roster() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::UserJoined(wire_user("u1", "Ann")));
    store.apply_inbound(&typing("u1", None, true));
    store.apply_inbound(&InboundEvent::UserCount(UserCount { count: 4 }));

    store.apply(&status(1, ConnectionStatus::Disconnected));
    assert!(store.roster().is_empty());
    assert_eq!(store.typing().count(), 0);
    assert_eq!(store.user_count(), None);
}

#[test]
fn reactions_merge_through_the_store() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::NewMessage(WireMessage {
        id: "m1".to_owned(),
        user_id: "u1".to_owned(),
        user_name: "Ann".to_owned(),
        message: "hi".to_owned(),
        message_type: "text".to_owned(),
        timestamp: 1,
        reactions: std::collections::BTreeMap::new(),
    }));

    let reaction = |action| {
        InboundEvent::MessageReactionUpdate(ReactionUpdate {
            message_id: "m1".to_owned(),
            emoji: "👍".to_owned(),
            user_id: "u2".to_owned(),
            action,
        })
    };
    let add = reaction(ReactionAction::Add);
    let remove = reaction(ReactionAction::Remove);

    assert!(store.apply_inbound(&add));
    assert!(!store.apply_inbound(&add));
    assert_eq!(store.transcript().get("m1").unwrap().reaction_count("👍"), 1);
    assert!(store.apply_inbound(&remove));
    assert!(!store.transcript().get("m1").unwrap().reactions.contains_key("👍"));
}

#[test]
fn chat_view_names_typists_other_than_me() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::UserJoined(wire_user("u2", "Bob")));
    store.apply_inbound(&typing("me", Some("Me"), true));
    store.apply_inbound(&typing("u1", Some("Ann"), true));
    store.apply_inbound(&typing("u2", None, true));

    let view = store.chat_view("me");
    assert_eq!(view.typing.as_deref(), Some("Ann and Bob are typing..."));

    store.apply_inbound(&typing("u1", None, false));
    assert_eq!(
        store.chat_view("me").typing.as_deref(),
        Some("Bob is typing...")
    );
}

#[test]
fn notices_and_confirmation_are_recorded() {
    let mut store = connected_store();
    store.apply_inbound(&InboundEvent::ConnectionConfirmed(events::ConnectionConfirmed {
        socket_id: Some("sock-1".to_owned()),
        message: Some("welcome".to_owned()),
    }));
    store.apply_inbound(&InboundEvent::ServerShutdown(Notice {
        message: "maintenance".to_owned(),
    }));

    assert_eq!(store.confirmed_socket_id(), Some("sock-1"));
    assert_eq!(
        store.take_notice(),
        Some(ServerNotice::Shutdown("maintenance".to_owned()))
    );
    assert_eq!(store.take_notice(), None);
}

#[test]
fn latency_follows_the_connection() {
    let mut store = connected_store();
    store.apply(&ClientEvent::Latency(Some(Duration::from_millis(40))));
    assert_eq!(store.latency(), Some(Duration::from_millis(40)));
    store.apply(&ClientEvent::Latency(None));
    assert_eq!(store.latency(), None);
}
