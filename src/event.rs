//! Typed events emitted by the Turing Test client.
//!
//! [`TuringTestEvent`]s are delivered on the bounded channel returned from
//! [`TuringTestClient::start`](crate::client::TuringTestClient::start).
//! `Connected` and `Disconnected` are synthetic (produced by the transport
//! loop, not the server); everything else is the machine's reaction to a
//! server message or a timer tick. When the consumer falls behind, events
//! other than `Disconnected` may be dropped — the full renderable state is
//! always available via
//! [`TuringTestClient::snapshot`](crate::client::TuringTestClient::snapshot).

use crate::protocol::{ChatMessage, GameEndReason, Role, SessionId};

/// Events emitted by the client to the embedding application.
#[derive(Debug, Clone, PartialEq)]
pub enum TuringTestEvent {
    /// The transport loop has started with a live transport.
    Connected,

    /// Queued in the lobby; carries the server's status line.
    Waiting { message: String },

    /// A session began. `persona` is present when the partner is an AI
    /// whose persona was disclosed to this client.
    MatchStarted {
        session_id: SessionId,
        role: Role,
        persona: Option<String>,
    },

    /// A chat turn from the partner was appended to the log.
    MessageReceived(ChatMessage),

    /// The countdown advanced by one second.
    TimerTick { remaining: u32 },

    /// The server ended the session. `incorrect` is the derived styling
    /// flag for guess verdicts (`None` when no verdict text applies).
    GameEnded {
        reason: GameEndReason,
        result: Option<String>,
        incorrect: Option<bool>,
    },

    /// The client was queued as an observer of another session.
    WatchingStarted {
        session_id: SessionId,
        message: String,
    },

    /// Observer-mode progress notice.
    WatchUpdate { message: String },

    /// Non-fatal server error, surfaced as status text.
    ServerError { message: String },

    /// The transport closed. Always the last event on the channel; never
    /// dropped under backpressure.
    Disconnected { reason: Option<String> },
}
