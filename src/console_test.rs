use super::*;

#[test]
fn plain_text_is_chat() {
    assert_eq!(parse_line("  hello there "), Ok(Input::Chat("hello there".to_owned())));
    assert_eq!(parse_line("   "), Ok(Input::Empty));
}

#[test]
fn reactions_parse_both_directions() {
    assert_eq!(
        parse_line("/react m1 👍"),
        Ok(Input::React {
            message_id: "m1".to_owned(),
            emoji: "👍".to_owned(),
            action: ReactionAction::Add,
        })
    );
    assert_eq!(
        parse_line("/unreact m1 👍"),
        Ok(Input::React {
            message_id: "m1".to_owned(),
            emoji: "👍".to_owned(),
            action: ReactionAction::Remove,
        })
    );
    assert!(matches!(parse_line("/react m1"), Err(InputError::Usage(_))));
}

#[test]
fn toggles_and_status() {
    assert_eq!(parse_line("/status away"), Ok(Input::Status(UserStatus::Away)));
    assert_eq!(parse_line("/follow on"), Ok(Input::Follow(true)));
    assert_eq!(parse_line("/active off"), Ok(Input::Active(false)));
    assert_eq!(parse_line("/record stop"), Ok(Input::Record(false)));
    assert!(matches!(parse_line("/status busy"), Err(InputError::Usage(_))));
    assert!(matches!(parse_line("/follow maybe"), Err(InputError::Usage(_))));
}

#[test]
fn export_takes_an_optional_directory() {
    assert_eq!(parse_line("/export"), Ok(Input::Export(None)));
    assert_eq!(
        parse_line("/export /tmp/out"),
        Ok(Input::Export(Some(PathBuf::from("/tmp/out"))))
    );
}

#[test]
fn unknown_commands_are_reported() {
    assert_eq!(
        parse_line("/dance"),
        Err(InputError::UnknownCommand("dance".to_owned()))
    );
    assert_eq!(parse_line("/quit"), Ok(Input::Quit));
}
