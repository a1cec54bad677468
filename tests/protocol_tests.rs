#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Turing Test Client.
//!
//! Verifies round-trip serialization of every protocol type, the exact
//! camelCase event and field names, and JSON fixtures that match real
//! server output.

use turing_test_client::protocol::{
    ChatMessage, ClientMessage, GameEndReason, Guess, MessageSender, Role, ServerMessage,
};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

/// Serialize `val` and parse the result into a generic JSON value.
fn to_value<T: serde::Serialize>(val: &T) -> serde_json::Value {
    serde_json::to_value(val).expect("to_value")
}

// ════════════════════════════════════════════════════════════════════
// Enum wire strings
// ════════════════════════════════════════════════════════════════════

#[test]
fn role_wire_strings() {
    assert_eq!(to_value(&Role::Tester), serde_json::json!("tester"));
    // The tested-person role is spelled with a space on the wire.
    assert_eq!(
        to_value(&Role::TestedPerson),
        serde_json::json!("tested person")
    );
}

#[test]
fn role_deserializes_from_wire_strings() {
    let role: Role = serde_json::from_str("\"tester\"").expect("deserialize");
    assert_eq!(role, Role::Tester);
    let role: Role = serde_json::from_str("\"tested person\"").expect("deserialize");
    assert_eq!(role, Role::TestedPerson);
}

#[test]
fn guess_wire_strings() {
    assert_eq!(to_value(&Guess::Human), serde_json::json!("human"));
    // The AI guess is upper-case on the wire.
    assert_eq!(to_value(&Guess::Ai), serde_json::json!("AI"));
}

#[test]
fn game_end_reason_wire_strings() {
    assert_eq!(
        to_value(&GameEndReason::Timeout),
        serde_json::json!("timeout")
    );
    assert_eq!(
        to_value(&GameEndReason::ReadyToGuess),
        serde_json::json!("readyToGuess")
    );
    assert_eq!(to_value(&GameEndReason::Guess), serde_json::json!("guess"));
}

#[test]
fn message_sender_wire_strings() {
    assert_eq!(to_value(&MessageSender::You), serde_json::json!("you"));
    assert_eq!(
        to_value(&MessageSender::Partner),
        serde_json::json!("partner")
    );
    assert_eq!(
        to_value(&MessageSender::System),
        serde_json::json!("system")
    );
}

// ════════════════════════════════════════════════════════════════════
// ClientMessage variants
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_message_join_lobby_matches_wire_format() {
    let msg = ClientMessage::JoinLobby { role: Role::Tester };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "joinLobby",
            "data": { "role": "tester" }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_new_game_matches_wire_format() {
    let msg = ClientMessage::NewGame {
        role: Role::TestedPerson,
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "newGame",
            "data": { "role": "tested person" }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_send_message_matches_wire_format() {
    let msg = ClientMessage::SendMessage {
        session_id: "sess-abc".into(),
        message: "hello there".into(),
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "sendMessage",
            "data": { "sessionId": "sess-abc", "message": "hello there" }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_make_guess_matches_wire_format() {
    let msg = ClientMessage::MakeGuess {
        session_id: "sess-abc".into(),
        guess: Guess::Ai,
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "makeGuess",
            "data": { "sessionId": "sess-abc", "guess": "AI" }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage variants
// ════════════════════════════════════════════════════════════════════

#[test]
fn server_message_waiting_for_partner_round_trip() {
    let msg = ServerMessage::WaitingForPartner("Waiting for a partner to join...".into());
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "waitingForPartner",
            "data": "Waiting for a partner to join..."
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_match_found_round_trip() {
    let msg = ServerMessage::MatchFound {
        session_id: "sess-1".into(),
        role: Role::Tester,
        message: "You are matched! Say hi.".into(),
        ai_persona: Some("a grumpy pirate".into()),
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "matchFound",
            "data": {
                "sessionId": "sess-1",
                "role": "tester",
                "message": "You are matched! Say hi.",
                "aiPersona": "a grumpy pirate"
            }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn match_found_omits_absent_persona() {
    let msg = ServerMessage::MatchFound {
        session_id: "sess-1".into(),
        role: Role::TestedPerson,
        message: "You are matched!".into(),
        ai_persona: None,
    };
    let value = to_value(&msg);
    assert!(value["data"].get("aiPersona").is_none());
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_new_message_round_trip() {
    let msg = ServerMessage::NewMessage(ChatMessage {
        sender: MessageSender::Partner,
        text: "how is the weather?".into(),
    });
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "newMessage",
            "data": { "sender": "partner", "text": "how is the weather?" }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_game_end_round_trip() {
    let msg = ServerMessage::GameEnd {
        reason: GameEndReason::Guess,
        result: Some("You guessed correctly! Your partner was an AI.".into()),
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "gameEnd",
            "data": {
                "reason": "guess",
                "result": "You guessed correctly! Your partner was an AI."
            }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_watching_game_round_trip() {
    let msg = ServerMessage::WatchingGame {
        session_id: "sess-w".into(),
        message: "You are watching an ongoing game.".into(),
    };
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "watchingGame",
            "data": {
                "sessionId": "sess-w",
                "message": "You are watching an ongoing game."
            }
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_game_complete_round_trip() {
    let msg = ServerMessage::GameComplete {
        message: "The game you were watching is complete.".into(),
    };
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_error_round_trip() {
    let msg = ServerMessage::Error("Your partner disconnected.".into());
    assert_eq!(
        to_value(&msg),
        serde_json::json!({
            "type": "error",
            "data": "Your partner disconnected."
        })
    );
    assert_eq!(round_trip(&msg), msg);
}

// ════════════════════════════════════════════════════════════════════
// Raw server fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_game_end_without_result_parses() {
    // A timeout end carries no result field at all.
    let raw = r#"{"type":"gameEnd","data":{"reason":"timeout"}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).expect("deserialize");
    if let ServerMessage::GameEnd { reason, result } = msg {
        assert_eq!(reason, GameEndReason::Timeout);
        assert!(result.is_none());
    } else {
        panic!("expected GameEnd, got {msg:?}");
    }
}

#[test]
fn fixture_match_found_without_persona_parses() {
    let raw = r#"{"type":"matchFound","data":{"sessionId":"k3J9x","role":"tested person","message":"You are matched! You are being tested."}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).expect("deserialize");
    if let ServerMessage::MatchFound {
        session_id,
        role,
        ai_persona,
        ..
    } = msg
    {
        assert_eq!(session_id, "k3J9x");
        assert_eq!(role, Role::TestedPerson);
        assert!(ai_persona.is_none());
    } else {
        panic!("expected MatchFound, got {msg:?}");
    }
}

#[test]
fn fixture_ready_to_guess_parses() {
    let raw = r#"{"type":"gameEnd","data":{"reason":"readyToGuess","result":"Chat over. Was your partner a human or an AI?"}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).expect("deserialize");
    if let ServerMessage::GameEnd { reason, result } = msg {
        assert_eq!(reason, GameEndReason::ReadyToGuess);
        assert!(result.unwrap().contains("human or an AI"));
    } else {
        panic!("expected GameEnd, got {msg:?}");
    }
}

#[test]
fn unknown_event_type_fails_to_parse() {
    let raw = r#"{"type":"somethingNew","data":{}}"#;
    let result = serde_json::from_str::<ServerMessage>(raw);
    assert!(result.is_err());
}

#[test]
fn unknown_reason_fails_to_parse() {
    let raw = r#"{"type":"gameEnd","data":{"reason":"surrender"}}"#;
    let result = serde_json::from_str::<ServerMessage>(raw);
    assert!(result.is_err());
}
