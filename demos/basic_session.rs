//! # Basic Session Example
//!
//! Demonstrates a complete Turing Test client lifecycle:
//!
//! 1. Connect to a game server via WebSocket
//! 2. Pick a role and join the lobby
//! 3. React to session events (match, chat, countdown, game end)
//! 4. Submit a guess when eligible and start a new game afterwards
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Turing Test game server on localhost:3000, then:
//! cargo run --example basic_session
//!
//! # Override the server URL:
//! TURING_TEST_URL=ws://my-server:3000/ws cargo run --example basic_session
//! ```

use turing_test_client::{
    Guess, Role, TuringTestClient, TuringTestConfig, TuringTestEvent, WebSocketTransport,
};

/// Default server URL when `TURING_TEST_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:3000/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("TURING_TEST_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    // Establish a WebSocket connection to the game server.
    let transport = WebSocketTransport::connect(&url).await?;

    // Start the client. This spawns a background task that drives the
    // transport and the countdown, and emits events on `event_rx`.
    let config = TuringTestConfig::new();
    let (mut client, mut event_rx) = TuringTestClient::start(transport, config);

    // Play as the tester: chat with the partner and guess who they are.
    client.select_role(Role::Tester)?;
    tracing::info!("Joined the lobby as the tester");

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both session events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the session loop.
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — session loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    TuringTestEvent::Connected => {
                        tracing::info!("Transport connected, waiting for a match…");
                    }

                    TuringTestEvent::Waiting { message } => {
                        tracing::info!("Lobby: {message}");
                    }

                    // ── Session lifecycle ────────────────────────────
                    TuringTestEvent::MatchStarted { session_id, role, persona } => {
                        tracing::info!("Matched into session {session_id} as {role:?}");
                        if let Some(persona) = persona {
                            tracing::info!("Partner is an AI playing: {persona}");
                        }

                        // Open the conversation.
                        client.send_chat("Hello! How is your day going?")?;
                    }

                    TuringTestEvent::MessageReceived(chat) => {
                        tracing::info!("[{:?}] {}", chat.sender, chat.text);
                    }

                    TuringTestEvent::TimerTick { remaining } => {
                        if remaining % 15 == 0 || remaining <= 10 {
                            tracing::info!("{remaining}s left on the clock");
                        }
                    }

                    TuringTestEvent::GameEnded { reason, result, incorrect } => {
                        tracing::info!("Game ended ({reason:?})");
                        if let Some(result) = result {
                            tracing::info!("Server says: {result}");
                        }

                        let snapshot = client.snapshot().await;
                        if snapshot.can_guess() {
                            // Commit to a verdict — the server replies with
                            // another gameEnd carrying the judged result.
                            tracing::info!("Guessing: AI");
                            client.make_guess(Guess::Ai)?;
                        } else if snapshot.can_replay() {
                            if incorrect == Some(true) {
                                tracing::info!("Wrong this time. Going again…");
                            }
                            client.new_game(Role::Tester)?;
                        }
                    }

                    // ── Observer mode ────────────────────────────────
                    TuringTestEvent::WatchingStarted { message, .. } => {
                        tracing::info!("Queued as observer: {message}");
                    }

                    TuringTestEvent::WatchUpdate { message } => {
                        tracing::info!("Observer update: {message}");
                    }

                    // ── Errors from the server ───────────────────────
                    TuringTestEvent::ServerError { message } => {
                        tracing::error!("Server error: {message}");
                    }

                    // ── Disconnect ───────────────────────────────────
                    TuringTestEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
