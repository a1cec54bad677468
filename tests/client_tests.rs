//! Integration-style client tests for the Turing Test Client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! messages and verify that `TuringTestClient` processes them correctly,
//! including state transitions, wire message generation, snapshot
//! publication, and event delivery.

mod common;

use turing_test_client::protocol::{ClientMessage, MessageSender};
use turing_test_client::{
    GameEndReason, Guess, Role, SessionPhase, TuringTestClient, TuringTestConfig, TuringTestError,
    TuringTestEvent,
};

use common::{
    error_json, game_complete_json, game_end_json, match_found_json, match_found_json_with,
    new_message_json, waiting_json, watching_game_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

/// Start a client with the given scripted server messages.
#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, TuringTestError>>>,
) -> (
    TuringTestClient,
    tokio::sync::mpsc::Receiver<TuringTestEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let config = TuringTestConfig::new();
    let (client, events) = TuringTestClient::start(transport, config);
    (client, events, sent, closed)
}

/// Consume the synthetic `Connected` event. Panics if it is not first.
async fn drain_connected(rx: &mut tokio::sync::mpsc::Receiver<TuringTestEvent>) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, TuringTestEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
}

/// Parse every recorded outgoing message.
fn sent_client_messages(sent: &std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> Vec<ClientMessage> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|m| serde_json::from_str(m).expect("parse sent client message"))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Lobby flow: role selection → waiting → match
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn tester_flow_join_lobby_to_chat() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(waiting_json("Waiting for a partner..."))),
        Some(Ok(match_found_json())),
    ]);

    drain_connected(&mut events).await;

    client.select_role(Role::Tester).expect("select_role");

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::Waiting { message } = ev {
        assert_eq!(message, "Waiting for a partner...");
    } else {
        panic!("expected Waiting, got {ev:?}");
    }

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::MatchStarted {
        session_id,
        role,
        persona,
    } = ev
    {
        assert_eq!(session_id, "sess-1");
        assert_eq!(role, Role::Tester);
        assert!(persona.is_none());
    } else {
        panic!("expected MatchStarted, got {ev:?}");
    }

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::InChat);
    assert_eq!(snap.messages.len(), 1);
    assert_eq!(snap.messages[0].sender, MessageSender::System);
    assert_eq!(snap.messages[0].text, "You are matched! Say hi.");
    assert_eq!(snap.time_remaining, 90);
    assert!(snap.timer_running);

    client.shutdown().await;
}

#[tokio::test]
async fn select_role_emits_join_lobby_with_role() {
    // NOTE: No scripted inbound here — scripted messages are consumed
    // immediately, so the joinLobby emission can only be asserted in a
    // test where the role selection is the sole input.
    let (mut client, mut events, sent, _closed) = start_client(vec![]);

    drain_connected(&mut events).await;
    client.select_role(Role::TestedPerson).expect("select_role");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let messages = sent_client_messages(&sent);
    assert_eq!(
        messages,
        vec![ClientMessage::JoinLobby {
            role: Role::TestedPerson
        }]
    );

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::AwaitingMatch);
    assert_eq!(snap.status, "Joining the lobby...");

    client.shutdown().await;
}

#[tokio::test]
async fn persona_match_discloses_persona_in_seed_message() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Ok(
        match_found_json_with("sess-9", Role::Tester, "You are matched!", Some("a grumpy pirate")),
    ))]);

    drain_connected(&mut events).await;
    client.select_role(Role::Tester).expect("select_role");

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::MatchStarted { persona, .. } = ev {
        assert_eq!(persona.as_deref(), Some("a grumpy pirate"));
    } else {
        panic!("expected MatchStarted, got {ev:?}");
    }

    let snap = client.snapshot().await;
    assert_eq!(snap.messages.len(), 1);
    assert!(snap.messages[0].text.contains("grumpy pirate"));
    assert_ne!(snap.messages[0].text, "You are matched!");

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Chat flow
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn inbound_chat_appends_in_delivery_order() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(new_message_json(MessageSender::Partner, "first"))),
        Some(Ok(new_message_json(MessageSender::Partner, "second"))),
        Some(Ok(new_message_json(MessageSender::Partner, "third"))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    for expected in ["first", "second", "third"] {
        let ev = events.recv().await.expect("event");
        if let TuringTestEvent::MessageReceived(chat) = ev {
            assert_eq!(chat.text, expected);
            assert_eq!(chat.sender, MessageSender::Partner);
        } else {
            panic!("expected MessageReceived, got {ev:?}");
        }
    }

    let snap = client.snapshot().await;
    // Seed system message plus three chat turns, strictly in order.
    assert_eq!(snap.messages.len(), 4);
    assert_eq!(snap.messages[1].text, "first");
    assert_eq!(snap.messages[2].text, "second");
    assert_eq!(snap.messages[3].text, "third");

    client.shutdown().await;
}

#[tokio::test]
async fn local_send_appends_and_emits_send_message() {
    let (mut client, mut events, sent, _closed) =
        start_client(vec![Some(Ok(match_found_json()))]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    client.send_chat("hi").expect("send_chat");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let snap = client.snapshot().await;
    let last = snap.messages.last().expect("local message appended");
    assert_eq!(last.sender, MessageSender::You);
    assert_eq!(last.text, "hi");

    let messages = sent_client_messages(&sent);
    assert_eq!(
        messages.last(),
        Some(&ClientMessage::SendMessage {
            session_id: "sess-1".into(),
            message: "hi".into(),
        })
    );

    client.shutdown().await;
}

#[tokio::test]
async fn blank_send_is_silently_rejected() {
    let (mut client, mut events, sent, _closed) =
        start_client(vec![Some(Ok(match_found_json()))]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    client.send_chat("").expect("send_chat");
    client.send_chat("   \t").expect("send_chat");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(sent_client_messages(&sent).is_empty());
    let snap = client.snapshot().await;
    assert_eq!(snap.messages.len(), 1); // just the seed

    client.shutdown().await;
}

#[tokio::test]
async fn send_before_match_emits_nothing() {
    let (mut client, mut events, sent, _closed) = start_client(vec![]);

    drain_connected(&mut events).await;

    client.select_role(Role::Tester).expect("select_role");
    client.send_chat("too early").expect("send_chat");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Only the joinLobby request went out.
    let messages = sent_client_messages(&sent);
    assert_eq!(
        messages,
        vec![ClientMessage::JoinLobby { role: Role::Tester }]
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Game end reasons
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn timeout_end_offers_replay_without_guess_controls() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(game_end_json(GameEndReason::Timeout, None))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::GameEnded {
        reason,
        result,
        incorrect,
    } = ev
    {
        assert_eq!(reason, GameEndReason::Timeout);
        assert!(result.is_none());
        assert!(incorrect.is_none());
    } else {
        panic!("expected GameEnded, got {ev:?}");
    }

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::Ended);
    assert_eq!(snap.status, "Game over!");
    assert!(!snap.timer_running);
    assert!(snap.can_replay());
    assert!(!snap.can_guess());
    assert!(!snap.can_send());

    client.shutdown().await;
}

#[tokio::test]
async fn ready_to_guess_enables_guess_for_tester_only() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(game_end_json(
            GameEndReason::ReadyToGuess,
            Some("Chat over — time to decide."),
        ))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted
    let _ = events.recv().await; // GameEnded

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::Ended);
    assert!(snap.can_guess());
    // No replay controls yet for a ready-to-guess end.
    assert!(!snap.can_replay());

    client.shutdown().await;
}

#[tokio::test]
async fn guess_verdict_flags_incorrect_by_substring() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(game_end_json(
            GameEndReason::Guess,
            Some("You guessed incorrectly! Your partner was a human."),
        ))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::GameEnded {
        reason, incorrect, ..
    } = ev
    {
        assert_eq!(reason, GameEndReason::Guess);
        assert_eq!(incorrect, Some(true));
    } else {
        panic!("expected GameEnded, got {ev:?}");
    }

    let snap = client.snapshot().await;
    assert!(snap.can_replay());
    assert!(!snap.can_guess());

    client.shutdown().await;
}

#[tokio::test]
async fn guess_request_is_tagged_with_session_id() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(game_end_json(
            GameEndReason::ReadyToGuess,
            Some("Decide now."),
        ))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted
    let _ = events.recv().await; // GameEnded(ReadyToGuess)

    client.make_guess(Guess::Human).expect("make_guess");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let messages = sent_client_messages(&sent);
    assert_eq!(
        messages.last(),
        Some(&ClientMessage::MakeGuess {
            session_id: "sess-1".into(),
            guess: Guess::Human,
        })
    );

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// New game
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn new_game_clears_everything_and_requests_match() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(new_message_json(MessageSender::Partner, "hello"))),
        Some(Ok(game_end_json(GameEndReason::Timeout, None))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted
    let _ = events.recv().await; // MessageReceived
    let _ = events.recv().await; // GameEnded

    client.new_game(Role::TestedPerson).expect("new_game");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::AwaitingMatch);
    assert_eq!(snap.role, Some(Role::TestedPerson));
    assert!(snap.session_id.is_none());
    assert!(snap.messages.is_empty());
    assert!(snap.outcome.is_none());
    assert!(snap.watching.is_none());
    assert_eq!(snap.time_remaining, 90);
    assert!(!snap.timer_running);

    let messages = sent_client_messages(&sent);
    assert_eq!(
        messages.last(),
        Some(&ClientMessage::NewGame {
            role: Role::TestedPerson
        })
    );

    client.shutdown().await;
}

#[tokio::test]
async fn repeated_new_game_yields_identical_snapshot() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(game_end_json(GameEndReason::Timeout, None))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted
    let _ = events.recv().await; // GameEnded

    client.new_game(Role::Tester).expect("new_game");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let once = client.snapshot().await;

    client.new_game(Role::Tester).expect("new_game");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let twice = client.snapshot().await;

    assert_eq!(once, twice);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Observer (watching) mode
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn watching_flow_enters_observer_mode_and_receives_updates() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(watching_game_json(
            "other-sess",
            "You are watching an ongoing game.",
        ))),
        Some(Ok(game_complete_json("The watched game finished."))),
    ]);

    drain_connected(&mut events).await;
    client.select_role(Role::TestedPerson).expect("select_role");

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::WatchingStarted {
        session_id,
        message,
    } = ev
    {
        assert_eq!(session_id, "other-sess");
        assert_eq!(message, "You are watching an ongoing game.");
    } else {
        panic!("expected WatchingStarted, got {ev:?}");
    }

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::WatchUpdate { message } = ev {
        assert_eq!(message, "The watched game finished.");
    } else {
        panic!("expected WatchUpdate, got {ev:?}");
    }

    let snap = client.snapshot().await;
    assert_eq!(snap.phase, SessionPhase::Watching);
    assert_eq!(
        snap.watching.as_ref().map(|w| w.session_id.as_str()),
        Some("other-sess")
    );
    assert_eq!(snap.messages.len(), 2);
    assert!(snap.session_id.is_none());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn server_error_updates_status_without_transition() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(match_found_json())),
        Some(Ok(error_json("Partner disconnected unexpectedly."))),
    ]);

    drain_connected(&mut events).await;
    let _ = events.recv().await; // MatchStarted

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::ServerError { message } = ev {
        assert_eq!(message, "Partner disconnected unexpectedly.");
    } else {
        panic!("expected ServerError, got {ev:?}");
    }

    let snap = client.snapshot().await;
    // Status surfaced, but the session is untouched.
    assert_eq!(snap.status, "Partner disconnected unexpectedly.");
    assert_eq!(snap.phase, SessionPhase::InChat);
    assert!(snap.timer_running);

    client.shutdown().await;
}

#[tokio::test]
async fn malformed_json_does_not_crash_and_next_message_arrives() {
    // Garbled text followed by a valid message: the session loop should
    // warn on the invalid JSON and continue.
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok("{{not valid json at all!!!".into())),
        Some(Ok(match_found_json())),
    ]);

    drain_connected(&mut events).await;
    client.select_role(Role::Tester).expect("select_role");

    let ev = events
        .recv()
        .await
        .expect("expected MatchStarted after malformed JSON");
    assert!(
        matches!(ev, TuringTestEvent::MatchStarted { .. }),
        "expected MatchStarted event after malformed JSON, got {ev:?}"
    );

    client.shutdown().await;
}

#[tokio::test]
async fn out_of_sequence_chat_is_ignored() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        // Chat before any match: must be dropped, not crash.
        Some(Ok(new_message_json(MessageSender::Partner, "early"))),
        Some(Ok(match_found_json())),
    ]);

    drain_connected(&mut events).await;
    client.select_role(Role::Tester).expect("select_role");

    // The first delivered event is MatchStarted — the early chat message
    // produced nothing.
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, TuringTestEvent::MatchStarted { .. }));

    let snap = client.snapshot().await;
    assert_eq!(snap.messages.len(), 1); // seed only

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Disconnect and shutdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn disconnect_on_transport_close() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![None]);

    drain_connected(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, TuringTestEvent::Disconnected { .. }));
    assert!(!client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn disconnect_on_transport_error() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Err(
        TuringTestError::TransportReceive("network failure".into()),
    ))]);

    drain_connected(&mut events).await;

    let ev = events.recv().await.expect("event");
    if let TuringTestEvent::Disconnected { reason } = ev {
        let r = reason.expect("reason should be present");
        assert!(r.contains("network failure"), "reason was: {r}");
    } else {
        panic!("expected Disconnected, got {ev:?}");
    }

    assert!(!client.is_connected());
    client.shutdown().await;
}

#[tokio::test]
async fn operations_fail_after_disconnect() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![None]);

    drain_connected(&mut events).await;

    // Wait for Disconnected.
    let _ev = events.recv().await;

    // Give the loop time to update the connected flag.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let result = client.select_role(Role::Tester);
    assert!(
        matches!(result, Err(TuringTestError::NotConnected)),
        "expected NotConnected error, got {result:?}"
    );

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_transport_and_emits_disconnected() {
    let (mut client, mut events, _sent, closed) = start_client(vec![]);

    drain_connected(&mut events).await;

    client.shutdown().await;

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, TuringTestEvent::Disconnected { .. }));
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
}
