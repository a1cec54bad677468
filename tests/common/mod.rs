#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Turing Test Client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing common server message JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use turing_test_client::protocol::{ChatMessage, MessageSender, ServerMessage};
use turing_test_client::{GameEndReason, Role, Transport, TuringTestError};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, TuringTestError>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, TuringTestError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), TuringTestError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TuringTestError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the session loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), TuringTestError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `waitingForPartner` server message.
pub fn waiting_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::WaitingForPartner(message.into()))
        .expect("waiting_json serialization")
}

/// Returns the JSON string for a `matchFound` server message with default values.
pub fn match_found_json() -> String {
    match_found_json_with("sess-1", Role::Tester, "You are matched! Say hi.", None)
}

/// Returns the JSON string for a `matchFound` server message with custom values.
pub fn match_found_json_with(
    session_id: &str,
    role: Role,
    message: &str,
    ai_persona: Option<&str>,
) -> String {
    serde_json::to_string(&ServerMessage::MatchFound {
        session_id: session_id.into(),
        role,
        message: message.into(),
        ai_persona: ai_persona.map(Into::into),
    })
    .expect("match_found_json serialization")
}

/// Returns the JSON string for a `newMessage` server message.
pub fn new_message_json(sender: MessageSender, text: &str) -> String {
    serde_json::to_string(&ServerMessage::NewMessage(ChatMessage {
        sender,
        text: text.into(),
    }))
    .expect("new_message_json serialization")
}

/// Returns the JSON string for a `gameEnd` server message.
pub fn game_end_json(reason: GameEndReason, result: Option<&str>) -> String {
    serde_json::to_string(&ServerMessage::GameEnd {
        reason,
        result: result.map(Into::into),
    })
    .expect("game_end_json serialization")
}

/// Returns the JSON string for a `watchingGame` server message.
pub fn watching_game_json(session_id: &str, message: &str) -> String {
    serde_json::to_string(&ServerMessage::WatchingGame {
        session_id: session_id.into(),
        message: message.into(),
    })
    .expect("watching_game_json serialization")
}

/// Returns the JSON string for a `gameComplete` server message.
pub fn game_complete_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::GameComplete {
        message: message.into(),
    })
    .expect("game_complete_json serialization")
}

/// Returns the JSON string for a server `error` message.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error(message.into()))
        .expect("error_json serialization")
}
