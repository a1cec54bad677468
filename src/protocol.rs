//! Wire-compatible protocol types for the Turing Test game protocol.
//!
//! Every type in this module produces identical JSON to the game server's
//! event payloads. Messages are adjacently tagged as
//! `{"type": "<eventName>", "data": …}` with camelCase event and field
//! names, so a thin adapter can map them one-to-one onto whatever framing
//! the deployment uses (WebSocket text frames by default).

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Opaque session identifier issued by the server on match.
pub type SessionId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// The part a player takes in one game cycle.
///
/// Chosen once per cycle and immutable within a session; a new role can
/// only be picked through an explicit new-game action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// Chats with an unknown partner and must guess human vs. AI.
    #[serde(rename = "tester")]
    Tester,
    /// Is evaluated by the tester; may be silently replaced by an AI persona.
    #[serde(rename = "tested person")]
    TestedPerson,
}

/// The tester's final verdict about the chat partner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Guess {
    #[serde(rename = "human")]
    Human,
    #[serde(rename = "AI")]
    Ai,
}

/// Why the server ended a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameEndReason {
    /// The chat window elapsed without a guess.
    Timeout,
    /// Chat is over; the tester may now submit a guess.
    ReadyToGuess,
    /// The tester guessed and the server judged the guess.
    Guess,
}

/// Who produced a chat line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// The local player.
    You,
    /// The matched partner (human or AI, the tester cannot tell which).
    Partner,
    /// A notice generated by the server or the client itself.
    System,
}

// ── Structs ─────────────────────────────────────────────────────────

/// One chat turn, as carried on the wire and as stored in the message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: MessageSender,
    pub text: String,
}

impl ChatMessage {
    /// Convenience constructor for system notices.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            sender: MessageSender::System,
            text: text.into(),
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Request to be matched, given the chosen role.
    JoinLobby { role: Role },
    /// Request a fresh match, discarding any current session.
    NewGame { role: Role },
    /// Deliver one chat turn to the partner.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        session_id: SessionId,
        message: String,
    },
    /// The tester's final decision.
    #[serde(rename_all = "camelCase")]
    MakeGuess { session_id: SessionId, guess: Guess },
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    /// Status update while queued for a partner.
    WaitingForPartner(String),
    /// A session begins. When `ai_persona` is present the tested person has
    /// been replaced by an AI and the persona text is disclosed to the
    /// tester instead of the raw server message.
    #[serde(rename_all = "camelCase")]
    MatchFound {
        session_id: SessionId,
        role: Role,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ai_persona: Option<String>,
    },
    /// One chat turn from the partner (or a server-side system line).
    NewMessage(ChatMessage),
    /// Authoritative termination of the current session. `result` is
    /// present when `reason` is `readyToGuess` or `guess`.
    GameEnd {
        reason: GameEndReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// The client is queued as an observer of another (AI-paired) session.
    #[serde(rename_all = "camelCase")]
    WatchingGame {
        session_id: SessionId,
        message: String,
    },
    /// Informational update while in observer mode.
    GameComplete { message: String },
    /// Non-fatal notice shown as status text; does not alter session state.
    Error(String),
}
