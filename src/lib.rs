//! # Turing Test Client
//!
//! Transport-agnostic Rust client for the Turing Test chat game protocol.
//!
//! This crate provides a high-level async client for the two-player
//! real-time guessing game: one player (the *tester*) chats with an unknown
//! partner and must guess whether it is a human or an AI; the other player
//! (the *tested person*) is either a human or silently replaced by an AI
//! persona. The client communicates with the game server using JSON text
//! messages over any bidirectional transport.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Wire-compatible** — all protocol types match the server's event format exactly
//! - **WebSocket built-in** — default `transport-websocket` feature provides `WebSocketTransport`
//! - **Event-driven** — receive typed `TuringTestEvent`s via a channel, or read
//!   the full renderable [`SessionSnapshot`] at any time
//! - **Consistent countdown** — the 90-second chat clock is owned by the session
//!   loop and can never race the server's authoritative game-end signal
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use turing_test_client::{
//!     Role, TuringTestClient, TuringTestConfig, TuringTestEvent, WebSocketTransport,
//! };
//!
//! let transport = WebSocketTransport::connect("ws://localhost:3000/ws").await?;
//! let (client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());
//!
//! client.select_role(Role::Tester)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TuringTestEvent::MatchStarted { .. } => client.send_chat("hello!")?,
//!         TuringTestEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod timer;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{TuringTestClient, TuringTestConfig};
pub use error::TuringTestError;
pub use event::TuringTestEvent;
pub use protocol::{ClientMessage, GameEndReason, Guess, Role, ServerMessage};
pub use session::{SessionPhase, SessionSnapshot};
pub use timer::CountdownTimer;
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
