//! Async client for the Turing Test game protocol.
//!
//! [`TuringTestClient`] is a thin handle that communicates with a background
//! session loop task via an unbounded MPSC channel of [`UserAction`]s. The
//! loop owns the [`SessionState`] machine, the transport, and the 1 Hz
//! countdown ticker, and dispatches all three input sources sequentially —
//! every transition runs to completion before the next input is processed.
//! Events are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<TuringTestEvent>`]) returned from
//! [`TuringTestClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connect_somehow().await;
//! let config = TuringTestConfig::new();
//! let (client, mut events) = TuringTestClient::start(transport, config);
//!
//! client.select_role(Role::Tester)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         TuringTestEvent::MatchStarted { session_id, .. } => { /* … */ }
//!         TuringTestEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::error::{Result, TuringTestError};
use crate::event::TuringTestEvent;
use crate::protocol::{Guess, Role, ServerMessage, SessionId};
use crate::session::{Effects, SessionSnapshot, SessionState, UserAction};
use crate::transport::Transport;

/// Default chat window length in seconds.
const DEFAULT_CHAT_DURATION_SECS: u32 = 90;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`TuringTestClient`].
///
/// All fields have sensible defaults; [`TuringTestConfig::new`] is
/// equivalent to `Default::default()`.
///
/// # Tuning
///
/// ```
/// use turing_test_client::client::TuringTestConfig;
/// use std::time::Duration;
///
/// let config = TuringTestConfig::new()
///     .with_chat_duration_secs(120)
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct TuringTestConfig {
    /// Chat window length in seconds. The countdown restarts from this
    /// value on every match. Defaults to **90**.
    pub chat_duration_secs: u32,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a
    /// warning logged) to avoid blocking the session loop. The
    /// `Disconnected` event is always delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`TuringTestClient::shutdown`] is called, the session loop is
    /// given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl TuringTestConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            chat_duration_secs: DEFAULT_CHAT_DURATION_SECS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the chat window length in seconds.
    #[must_use]
    pub fn with_chat_duration_secs(mut self, seconds: u32) -> Self {
        self.chat_duration_secs = seconds;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for TuringTestConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the session loop.
struct SharedState {
    connected: AtomicBool,
    snapshot: Mutex<SessionSnapshot>,
}

impl SharedState {
    fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            connected: AtomicBool::new(true),
            snapshot: Mutex::new(snapshot),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Turing Test game protocol.
///
/// Created via [`TuringTestClient::start`], which spawns a background
/// session loop and returns this handle together with an event receiver.
///
/// All public methods enqueue a [`UserAction`] to the session loop over an
/// unbounded channel and return immediately once queued (no round-trip
/// await). Guard conditions — blank send, ineligible guess, repeated role
/// selection — are applied by the state machine inside the loop; an
/// ineligible action is a silent no-op on the wire.
pub struct TuringTestClient {
    /// Sender half of the action channel to the session loop.
    action_tx: mpsc::UnboundedSender<UserAction>,
    /// Shared state updated by the session loop.
    state: Arc<SharedState>,
    /// Handle to the background session loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the session loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl TuringTestClient {
    /// Start the session loop and return a handle plus event receiver.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `config` — Client configuration.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`TuringTestEvent`]s until the transport closes or the client
    /// shuts down.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: TuringTestConfig,
    ) -> (Self, mpsc::Receiver<TuringTestEvent>) {
        let (action_tx, action_rx) = mpsc::unbounded_channel::<UserAction>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<TuringTestEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let machine = SessionState::new(config.chat_duration_secs);
        let state = Arc::new(SharedState::new(machine.snapshot()));
        let loop_state = Arc::clone(&state);

        let task = tokio::spawn(session_loop(
            transport,
            machine,
            action_rx,
            event_tx,
            loop_state,
            shutdown_rx,
        ));

        let client = Self {
            action_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Pick a role and request to be matched.
    ///
    /// # Errors
    ///
    /// Returns [`TuringTestError::NotConnected`] if the transport has closed.
    pub fn select_role(&self, role: Role) -> Result<()> {
        self.dispatch(UserAction::SelectRole(role))
    }

    /// Send one chat turn to the matched partner.
    ///
    /// Blank input, a missing session, or an ended chat make this a silent
    /// no-op (nothing is emitted on the wire).
    ///
    /// # Errors
    ///
    /// Returns [`TuringTestError::NotConnected`] if the transport has closed.
    pub fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        self.dispatch(UserAction::SendChat(text.into()))
    }

    /// Submit the tester's verdict about the partner.
    ///
    /// A no-op unless this client is the tester, a session is active, and
    /// the server has signalled ready-to-guess.
    ///
    /// # Errors
    ///
    /// Returns [`TuringTestError::NotConnected`] if the transport has closed.
    pub fn make_guess(&self, guess: Guess) -> Result<()> {
        self.dispatch(UserAction::MakeGuess(guess))
    }

    /// Discard the current cycle and rejoin the lobby with the given role.
    ///
    /// # Errors
    ///
    /// Returns [`TuringTestError::NotConnected`] if the transport has closed.
    pub fn new_game(&self, role: Role) -> Result<()> {
        self.dispatch(UserAction::NewGame(role))
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// After calling this method, the event receiver will yield `None` once
    /// the session loop exits.
    pub async fn shutdown(&mut self) {
        debug!("TuringTestClient: shutdown requested");

        // Signal the session loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the session loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Clone the latest renderable session snapshot.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot.lock().await.clone()
    }

    /// Returns the current session identifier, if a session is active.
    pub async fn current_session_id(&self) -> Option<SessionId> {
        self.state.snapshot.lock().await.session_id.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `UserAction` to the session loop.
    fn dispatch(&self, action: UserAction) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(TuringTestError::NotConnected);
        }
        self.action_tx
            .send(action)
            .map_err(|_| TuringTestError::NotConnected)
    }
}

impl std::fmt::Debug for TuringTestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuringTestClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for TuringTestClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the session loop future to be dropped immediately. The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async
        // `transport.close()`, but there is no executor context to drive
        // it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Background session loop that multiplexes user actions, inbound server
/// messages, and the 1 Hz countdown tick via `tokio::select!`.
///
/// Exits when:
/// - The action channel closes (client handle dropped or shutdown called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
async fn session_loop(
    mut transport: impl Transport,
    mut machine: SessionState,
    mut action_rx: mpsc::UnboundedReceiver<UserAction>,
    event_tx: mpsc::Sender<TuringTestEvent>,
    state: Arc<SharedState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("session loop started");

    // Emit the synthetic Connected event before entering the select loop.
    emit_event(&event_tx, TuringTestEvent::Connected).await;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick completes immediately; consume it so the
    // select loop only sees real one-second ticks.
    ticker.tick().await;

    loop {
        tokio::select! {
            // Branch 1: local user action from the client handle
            action = action_rx.recv() => {
                match action {
                    Some(action) => {
                        let effects = machine.handle(action);
                        if run_effects(&mut transport, &event_tx, &state, &machine, &mut ticker, effects)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    // Action channel closed — client handle dropped.
                    None => {
                        debug!("action channel closed, shutting down session loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                let effects = machine.apply(server_msg);
                                if run_effects(&mut transport, &event_tx, &state, &machine, &mut ticker, effects)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("failed to deserialize server message: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }

            // Branch 4: countdown tick
            _ = ticker.tick() => {
                let effects = machine.tick();
                if run_effects(&mut transport, &event_tx, &state, &machine, &mut ticker, effects)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    debug!("session loop exited");
}

/// Execute the [`Effects`] returned by a machine transition: send the
/// outbound wire message, realign the ticker if the countdown restarted,
/// emit the subscriber event, and publish the new snapshot.
///
/// Returns `Err(())` when the transport send fails — the caller must break
/// out of the loop (a `Disconnected` event has already been emitted).
async fn run_effects(
    transport: &mut impl Transport,
    event_tx: &mpsc::Sender<TuringTestEvent>,
    state: &SharedState,
    machine: &SessionState,
    ticker: &mut Interval,
    effects: Effects,
) -> std::result::Result<(), ()> {
    if let Some(msg) = effects.outbound {
        debug!("sending client message: {:?}", std::mem::discriminant(&msg));
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if let Err(e) = transport.send(json).await {
                    error!("transport send error: {e}");
                    emit_disconnected(event_tx, state, Some(format!("transport send error: {e}")))
                        .await;
                    return Err(());
                }
            }
            Err(e) => {
                error!("failed to serialize client message: {e}");
                // Serialization errors are programming bugs; don't kill the loop.
            }
        }
    }

    if effects.restart_ticker {
        // A countdown just (re)started: the first decrement should land a
        // full second from now, not at the next free-running interval edge.
        ticker.reset();
    }

    // Publish the snapshot before notifying: a consumer that reads the
    // snapshot in response to the event must never see pre-transition state.
    *state.snapshot.lock().await = machine.snapshot();

    if let Some(event) = effects.event {
        emit_event(event_tx, event).await;
    }

    Ok(())
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the session loop.
async fn emit_event(event_tx: &mpsc::Sender<TuringTestEvent>, event: TuringTestEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](TuringTestEvent::Disconnected) event and update state.
///
/// Uses `send().await` (blocking) instead of `try_send` because `Disconnected`
/// is always the last event on the channel and must never be silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<TuringTestEvent>,
    state: &SharedState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    let event = TuringTestEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{ChatMessage, ClientMessage, GameEndReason, MessageSender};
    use crate::session::SessionPhase;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, TuringTestError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, TuringTestError>>>,
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
        async fn send(&mut self, message: String) -> std::result::Result<(), TuringTestError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, TuringTestError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted message or error.
                item
            } else {
                // All scripted messages have been delivered — hang forever
                // so the session loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), TuringTestError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn match_found_json() -> String {
        serde_json::to_string(&ServerMessage::MatchFound {
            session_id: "sess-42".into(),
            role: Role::Tester,
            message: "You are matched! Say hi.".into(),
            ai_persona: None,
        })
        .unwrap()
    }

    fn game_end_json(reason: GameEndReason, result: Option<&str>) -> String {
        serde_json::to_string(&ServerMessage::GameEnd {
            reason,
            result: result.map(Into::into),
        })
        .unwrap()
    }

    fn sent_client_messages(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<ClientMessage> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|m| serde_json::from_str(m).unwrap())
            .collect()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, TuringTestEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn select_role_sends_join_lobby() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        client.select_role(Role::Tester).unwrap();

        // Give the loop a moment to process.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let messages = sent_client_messages(&sent);
        assert_eq!(
            messages.first(),
            Some(&ClientMessage::JoinLobby { role: Role::Tester })
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn match_found_updates_snapshot_and_emits_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(match_found_json()))]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        if let TuringTestEvent::MatchStarted {
            session_id,
            role,
            persona,
        } = ev
        {
            assert_eq!(session_id, "sess-42");
            assert_eq!(role, Role::Tester);
            assert!(persona.is_none());
        } else {
            panic!("expected MatchStarted, got {ev:?}");
        }

        let snap = client.snapshot().await;
        assert_eq!(snap.phase, SessionPhase::InChat);
        assert_eq!(snap.time_remaining, 90);
        assert!(snap.timer_running);
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(client.current_session_id().await.as_deref(), Some("sess-42"));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_flow_after_match() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(match_found_json()))]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, TuringTestEvent::MatchStarted { .. }));

        // With paused time the ticker advances as soon as the loop is idle.
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, TuringTestEvent::TimerTick { remaining: 89 });
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, TuringTestEvent::TimerTick { remaining: 88 });

        client.shutdown().await;
    }

    #[tokio::test]
    async fn game_end_stops_timer_and_snapshot_shows_ended() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(match_found_json())),
            Some(Ok(game_end_json(GameEndReason::Timeout, None))),
        ]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted
        let ev = events.recv().await.unwrap();
        if let TuringTestEvent::GameEnded { reason, .. } = ev {
            assert_eq!(reason, GameEndReason::Timeout);
        } else {
            panic!("expected GameEnded, got {ev:?}");
        }

        let snap = client.snapshot().await;
        assert_eq!(snap.phase, SessionPhase::Ended);
        assert!(!snap.timer_running);
        assert!(snap.can_replay());
        assert!(!snap.can_guess());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn chat_round_trip_appends_and_emits() {
        let chat_json = serde_json::to_string(&ServerMessage::NewMessage(ChatMessage {
            sender: MessageSender::Partner,
            text: "hello there".into(),
        }))
        .unwrap();
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(match_found_json())), Some(Ok(chat_json))]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted

        let ev = events.recv().await.unwrap();
        if let TuringTestEvent::MessageReceived(chat) = ev {
            assert_eq!(chat.sender, MessageSender::Partner);
            assert_eq!(chat.text, "hello there");
        } else {
            panic!("expected MessageReceived, got {ev:?}");
        }

        client.send_chat("hi back").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let messages = sent_client_messages(&sent);
        assert_eq!(
            messages.last(),
            Some(&ClientMessage::SendMessage {
                session_id: "sess-42".into(),
                message: "hi back".into(),
            })
        );
        let snap = client.snapshot().await;
        assert_eq!(snap.messages.len(), 3); // seed + partner + local

        client.shutdown().await;
    }

    #[tokio::test]
    async fn blank_send_emits_nothing() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(match_found_json()))]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted

        client.send_chat("   ").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(sent_client_messages(&sent).is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn guess_flows_to_wire_after_ready_to_guess() {
        // NOTE: Scripted messages are consumed immediately, so ineligible
        // in-between guesses cannot be asserted here — the machine-level
        // tests in `session` cover eligibility exhaustively.
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(match_found_json())),
            Some(Ok(game_end_json(
                GameEndReason::ReadyToGuess,
                Some("Time to decide."),
            ))),
        ]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted
        let _ = events.recv().await; // GameEnded(ReadyToGuess)

        client.make_guess(Guess::Ai).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let messages = sent_client_messages(&sent);
        assert_eq!(
            messages,
            vec![ClientMessage::MakeGuess {
                session_id: "sess-42".into(),
                guess: Guess::Ai,
            }]
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn new_game_resets_snapshot_and_sends_request() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(match_found_json())),
            Some(Ok(game_end_json(GameEndReason::Timeout, None))),
        ]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted
        let _ = events.recv().await; // GameEnded

        client.new_game(Role::TestedPerson).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let snap = client.snapshot().await;
        assert_eq!(snap.phase, SessionPhase::AwaitingMatch);
        assert!(snap.messages.is_empty());
        assert!(snap.session_id.is_none());
        assert_eq!(snap.time_remaining, 90);

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
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![None]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TuringTestEvent::Disconnected { .. }));
        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        client.shutdown().await;

        let result = client.select_role(Role::Tester);
        assert!(matches!(result, Err(TuringTestError::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        client.shutdown().await;

        let event = events.recv().await.unwrap();
        if let TuringTestEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        } else {
            panic!("expected Disconnected, got {event:?}");
        }
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected

        // Drop the client without calling shutdown.
        drop(client);

        // The session loop should eventually exit; the event channel
        // closes. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = TuringTestConfig::new();
        assert_eq!(config.chat_duration_secs, 90);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = TuringTestConfig::new()
            .with_chat_duration_secs(120)
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.chat_duration_secs, 120);
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = TuringTestConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn custom_chat_duration_reaches_the_machine() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(match_found_json()))]);
        let config = TuringTestConfig::new().with_chat_duration_secs(30);
        let (mut client, mut events) = TuringTestClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // MatchStarted

        let snap = client.snapshot().await;
        assert_eq!(snap.time_remaining, 30);
        assert!(snap.timer_running);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            TuringTestError::TransportReceive("boom".into()),
        ))]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        if let TuringTestEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        } else {
            panic!("expected Disconnected, got {event:?}");
        }

        client.shutdown().await;
    }

    /// Transport that hangs forever in `close()` so shutdown timeout/abort can be tested.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl HangingCloseTransport {
        fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
            let close_called = Arc::new(AtomicBool::new(false));
            let dropped = Arc::new(AtomicBool::new(false));
            (
                Self {
                    close_called: Arc::clone(&close_called),
                    dropped: Arc::clone(&dropped),
                },
                close_called,
                dropped,
            )
        }
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), TuringTestError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, TuringTestError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), TuringTestError> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let (transport, close_called, dropped) = HangingCloseTransport::new();
        let config = TuringTestConfig::new().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = TuringTestClient::start(transport, config);

        // Drain Connected so the channel remains uncongested.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, TuringTestEvent::Connected));

        client.shutdown().await;

        assert!(
            close_called.load(Ordering::Acquire),
            "transport.close() should have been attempted during graceful shutdown"
        );
        assert!(
            dropped.load(Ordering::Acquire),
            "timed-out shutdown should abort and drop the session loop task"
        );
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = TuringTestClient::start(transport, TuringTestConfig::new());

        let _ = events.recv().await; // Connected

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("TuringTestClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }
}
