use super::*;
use crate::{ReactionAction, Role, UserStatus};
use serde_json::json;

#[test]
fn decode_users_list_applies_field_defaults() {
    let event = InboundEvent::decode(
        "users-list",
        json!([
            {"id": "u1", "name": "Ann", "role": "admin", "location": {"latitude": 1.0, "longitude": 2.0}},
            {"id": "u2", "name": "Bob"}
        ]),
    )
    .expect("users-list");
    let InboundEvent::UsersList(users) = event else {
        panic!("expected users-list");
    };
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].role, Role::Admin);
    assert_eq!(users[0].location, Some(crate::LatLng::new(1.0, 2.0)));
    assert_eq!(users[1].role, Role::Worker);
    assert_eq!(users[1].status, UserStatus::Online);
    assert!(users[1].trail.is_empty());
}

#[test]
fn decode_location_update_reads_camel_case_fields() {
    let event = InboundEvent::decode(
        "location-update",
        json!({
            "userId": "u1",
            "location": {"latitude": 40.1, "longitude": -74.2},
            "speed": 3.5,
            "timestamp": 1_700_000_000_000_i64
        }),
    )
    .expect("location-update");
    let InboundEvent::LocationUpdate(update) = event else {
        panic!("expected location-update");
    };
    assert_eq!(update.user_id, "u1");
    assert_eq!(update.speed, Some(3.5));
    assert_eq!(update.heading, None);
    assert_eq!(update.timestamp, 1_700_000_000_000);
}

#[test]
fn decode_reaction_update_parses_action() {
    let event = InboundEvent::decode(
        "message-reaction-update",
        json!({"messageId": "m1", "emoji": "👍", "userId": "u2", "action": "remove"}),
    )
    .expect("reaction");
    assert_eq!(
        event,
        InboundEvent::MessageReactionUpdate(ReactionUpdate {
            message_id: "m1".to_owned(),
            emoji: "👍".to_owned(),
            user_id: "u2".to_owned(),
            action: ReactionAction::Remove,
        })
    );
}

#[test]
fn decode_new_message_defaults_type_and_reactions() {
    let event = InboundEvent::decode(
        "new-message",
        json!({"id": "m1", "userId": "u1", "userName": "Ann", "message": "hi", "timestamp": 7}),
    )
    .expect("new-message");
    let InboundEvent::NewMessage(message) = event else {
        panic!("expected new-message");
    };
    assert_eq!(message.message_type, "text");
    assert!(message.reactions.is_empty());
}

#[test]
fn decode_rejects_unknown_event_name() {
    let err = InboundEvent::decode("cursor-moved", json!({})).expect_err("unknown");
    assert!(matches!(err, CodecError::UnknownEvent(name) if name == "cursor-moved"));
}

#[test]
fn decode_rejects_payload_with_wrong_shape() {
    let err = InboundEvent::decode("user-left", json!({"id": "u1"})).expect_err("bad payload");
    assert!(matches!(err, CodecError::Payload { event, .. } if event == "user-left"));

    let err = InboundEvent::decode("user-typing", json!({"userId": "u1", "isTyping": "yes"}))
        .expect_err("bad payload");
    assert!(matches!(err, CodecError::Payload { .. }));
}

#[test]
fn every_declared_name_round_trips_through_name() {
    let samples = vec![
        InboundEvent::UserLeft(UserLeft {
            user_id: "u".to_owned(),
        }),
        InboundEvent::UserCount(UserCount { count: 3 }),
        InboundEvent::Pong(crate::PingPayload { timestamp: 1 }),
        InboundEvent::ServerShutdown(Notice {
            message: "bye".to_owned(),
        }),
        InboundEvent::Error(Notice {
            message: "oops".to_owned(),
        }),
        InboundEvent::ConnectionConfirmed(ConnectionConfirmed::default()),
    ];
    for event in samples {
        assert!(InboundEvent::NAMES.contains(&event.name()));
        let tagged = serde_json::to_value(&event).expect("serialize");
        let data = tagged.get("data").cloned().expect("data");
        let decoded = InboundEvent::decode(event.name(), data).expect("decode");
        assert_eq!(decoded, event);
    }
}
