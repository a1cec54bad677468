//! Session state machine for the Turing Test game.
//!
//! [`SessionState`] is the single source of truth for everything the
//! presentation layer renders: lifecycle phase, role, message log,
//! countdown, outcome, and observer state. Both inbound server messages
//! ([`apply`](SessionState::apply)) and local user intents
//! ([`handle`](SessionState::handle)) are inputs to the same pure
//! transition core; each transition returns [`Effects`] — the wire message
//! to emit and the event to notify subscribers with — so the machine does
//! no I/O and is testable without a runtime.
//!
//! Every transition runs to completion before the next input is processed
//! (the client loop dispatches sequentially), so there is no locking here
//! and no partially-applied state is ever observable.

use serde::Serialize;
use tracing::debug;

use crate::event::TuringTestEvent;
use crate::protocol::{
    ChatMessage, ClientMessage, GameEndReason, Guess, MessageSender, Role, ServerMessage, SessionId,
};
use crate::timer::CountdownTimer;

// ── Status lines ────────────────────────────────────────────────────

/// Status shown before a role has been picked.
const STATUS_SELECT_ROLE: &str = "Select your role to begin.";
/// Status shown while a lobby request is in flight.
const STATUS_JOINING: &str = "Joining the lobby...";
/// Status shown once the server terminates a session.
const STATUS_GAME_OVER: &str = "Game over!";

/// Marker the server embeds in a wrong-guess verdict. The wire contract
/// reports verdicts as free text, so styling keys off this substring.
const INCORRECT_MARKER: &str = "incorrectly";

// ── Phase ───────────────────────────────────────────────────────────

/// Lifecycle phase of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// No role picked yet; nothing has been sent to the server.
    NoRole,
    /// A lobby request is outstanding; waiting for a match.
    AwaitingMatch,
    /// Queued as an observer of another (AI-paired) session.
    Watching,
    /// Matched and chatting.
    InChat,
    /// The server terminated the session; awaiting guess or new-game.
    Ended,
}

// ── Message log ─────────────────────────────────────────────────────

/// Append-only ordered record of chat turns.
///
/// Display order is strictly append order; entries are never reordered,
/// deduplicated, or mutated after append. The log is cleared only when a
/// new cycle begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    /// Append one message.
    pub fn push(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole log with a single seed message.
    fn reseed(&mut self, message: ChatMessage) {
        self.entries.clear();
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in append order.
    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// How and why the last session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    pub reason: GameEndReason,
    /// Human-readable verdict from the server, when one applies.
    pub result_text: Option<String>,
    /// Derived styling flag for guess verdicts: `Some(true)` when the
    /// verdict text contains the negative marker. `None` when the reason
    /// carries no verdict.
    pub incorrect: Option<bool>,
}

impl GameOutcome {
    fn from_game_end(reason: GameEndReason, result: Option<String>) -> Self {
        let incorrect = match reason {
            GameEndReason::Guess => result.as_deref().map(|r| r.contains(INCORRECT_MARKER)),
            GameEndReason::Timeout | GameEndReason::ReadyToGuess => None,
        };
        Self {
            reason,
            result_text: result,
            incorrect,
        }
    }
}

/// Observer-mode state. Mutually exclusive with a playable session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedGame {
    /// Identifier of the session being observed.
    pub session_id: SessionId,
}

// ── Inputs and effects ──────────────────────────────────────────────

/// A local user intent, fed to the machine by the client handle.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    /// Pick a role and join the lobby (only valid before any role exists).
    SelectRole(Role),
    /// Send one chat turn to the partner.
    SendChat(String),
    /// Submit the tester's verdict.
    MakeGuess(Guess),
    /// Discard the current cycle and rejoin the lobby with the given role.
    NewGame(Role),
}

/// What a transition asks the surrounding loop to do.
///
/// The machine itself performs no I/O: outbound wire traffic and event
/// notification are returned here and executed by the client loop.
#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    /// Wire message to send, if the transition emits one.
    pub outbound: Option<ClientMessage>,
    /// Event to deliver to subscribers, if any.
    pub event: Option<TuringTestEvent>,
    /// The countdown was (re)started: the loop should realign its 1 Hz
    /// ticker so the first decrement lands a full second from now.
    pub restart_ticker: bool,
}

impl Effects {
    fn none() -> Self {
        Self::default()
    }

    fn event(event: TuringTestEvent) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Cloneable view of the whole machine for the presentation layer.
///
/// The renderer reads a snapshot and derives all control visibility from
/// it; it never mutates state directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub role: Option<Role>,
    pub session_id: Option<SessionId>,
    pub status: String,
    pub messages: Vec<ChatMessage>,
    pub time_remaining: u32,
    pub timer_running: bool,
    pub outcome: Option<GameOutcome>,
    pub watching: Option<WatchedGame>,
}

impl SessionSnapshot {
    /// Whether the chat input should accept a send.
    pub fn can_send(&self) -> bool {
        self.session_id.is_some() && self.phase != SessionPhase::Ended
    }

    /// Whether guess controls are eligible: tester role, a live session,
    /// and a ready-to-guess outcome.
    pub fn can_guess(&self) -> bool {
        self.role == Some(Role::Tester)
            && self.session_id.is_some()
            && matches!(
                self.outcome,
                Some(GameOutcome {
                    reason: GameEndReason::ReadyToGuess,
                    ..
                })
            )
    }

    /// Whether replay (new-game) controls are offered. Timeout and judged
    /// guesses offer replay to both roles; ready-to-guess does not yet.
    pub fn can_replay(&self) -> bool {
        matches!(
            self.outcome,
            Some(GameOutcome {
                reason: GameEndReason::Timeout | GameEndReason::Guess,
                ..
            })
        )
    }
}

// ── State machine ───────────────────────────────────────────────────

/// The client session state machine.
///
/// Owns the current role, session identity, phase, message log, countdown
/// timer, and outcome, and interprets every inbound server message and
/// outbound user intent as a transition. See the module docs for the
/// dispatch model.
#[derive(Debug)]
pub struct SessionState {
    /// Chat window length in seconds; the countdown restarts from this on
    /// every match.
    chat_duration: u32,
    phase: SessionPhase,
    role: Option<Role>,
    session_id: Option<SessionId>,
    /// AI persona disclosed on match, when the partner is simulated.
    persona: Option<String>,
    status: String,
    log: MessageLog,
    timer: CountdownTimer,
    outcome: Option<GameOutcome>,
    watching: Option<WatchedGame>,
}

impl SessionState {
    /// Create a fresh machine with the given chat window length.
    pub fn new(chat_duration: u32) -> Self {
        Self {
            chat_duration,
            phase: SessionPhase::NoRole,
            role: None,
            session_id: None,
            persona: None,
            status: STATUS_SELECT_ROLE.to_string(),
            log: MessageLog::default(),
            timer: CountdownTimer::new(chat_duration),
            outcome: None,
            watching: None,
        }
    }

    // ── User actions ────────────────────────────────────────────────

    /// Apply a local user intent.
    ///
    /// Ineligible actions (blank send, guess without eligibility, role
    /// re-selection) are silent no-ops: they emit nothing and change
    /// nothing.
    pub fn handle(&mut self, action: UserAction) -> Effects {
        match action {
            UserAction::SelectRole(role) => self.select_role(role),
            UserAction::SendChat(text) => self.send_chat(text),
            UserAction::MakeGuess(guess) => self.make_guess(guess),
            UserAction::NewGame(role) => self.new_game(role),
        }
    }

    fn select_role(&mut self, role: Role) -> Effects {
        if self.phase != SessionPhase::NoRole {
            debug!(?role, phase = ?self.phase, "ignoring role selection outside NoRole");
            return Effects::none();
        }
        self.role = Some(role);
        self.phase = SessionPhase::AwaitingMatch;
        self.status = STATUS_JOINING.to_string();
        debug!(?role, "joining lobby");
        Effects {
            outbound: Some(ClientMessage::JoinLobby { role }),
            ..Effects::default()
        }
    }

    fn send_chat(&mut self, text: String) -> Effects {
        if text.trim().is_empty() || self.phase == SessionPhase::Ended {
            return Effects::none();
        }
        let Some(session_id) = self.session_id.clone() else {
            return Effects::none();
        };
        self.log.push(ChatMessage {
            sender: MessageSender::You,
            text: text.clone(),
        });
        Effects {
            outbound: Some(ClientMessage::SendMessage {
                session_id,
                message: text,
            }),
            ..Effects::default()
        }
    }

    /// Guess resolver: translate the verdict into a wire request tagged
    /// with the active session. Eligibility is re-validated here, not just
    /// by the renderer — an ineligible guess emits nothing.
    fn make_guess(&mut self, guess: Guess) -> Effects {
        let eligible = self.role == Some(Role::Tester)
            && matches!(
                self.outcome,
                Some(GameOutcome {
                    reason: GameEndReason::ReadyToGuess,
                    ..
                })
            );
        if !eligible {
            debug!(?guess, "ignoring ineligible guess");
            return Effects::none();
        }
        let Some(session_id) = self.session_id.clone() else {
            return Effects::none();
        };
        debug!(?guess, "submitting guess");
        Effects {
            outbound: Some(ClientMessage::MakeGuess { session_id, guess }),
            ..Effects::default()
        }
    }

    fn new_game(&mut self, role: Role) -> Effects {
        // Stop the countdown before touching anything else so a stale tick
        // can never decrement a clock belonging to the next session.
        self.timer.reset(self.chat_duration);
        self.session_id = None;
        self.persona = None;
        self.log.clear();
        self.outcome = None;
        self.watching = None;
        self.role = Some(role);
        self.phase = SessionPhase::AwaitingMatch;
        self.status = STATUS_JOINING.to_string();
        debug!(?role, "new game requested");
        Effects {
            outbound: Some(ClientMessage::NewGame { role }),
            ..Effects::default()
        }
    }

    // ── Server messages ─────────────────────────────────────────────

    /// Apply one inbound server message.
    ///
    /// Out-of-sequence messages (chat with no live session, `gameEnd`
    /// outside chat, observer notices outside observer mode) are ignored
    /// with a debug log — timing races with the server are expected and
    /// must never corrupt state.
    pub fn apply(&mut self, msg: ServerMessage) -> Effects {
        match msg {
            ServerMessage::WaitingForPartner(message) => {
                self.status = message.clone();
                Effects::event(TuringTestEvent::Waiting { message })
            }
            ServerMessage::MatchFound {
                session_id,
                role,
                message,
                ai_persona,
            } => self.match_found(session_id, role, message, ai_persona),
            ServerMessage::NewMessage(chat) => {
                if self.phase != SessionPhase::InChat {
                    debug!(phase = ?self.phase, "dropping chat message outside InChat");
                    return Effects::none();
                }
                self.log.push(chat.clone());
                Effects::event(TuringTestEvent::MessageReceived(chat))
            }
            ServerMessage::GameEnd { reason, result } => self.game_end(reason, result),
            ServerMessage::WatchingGame {
                session_id,
                message,
            } => self.watching_game(session_id, message),
            ServerMessage::GameComplete { message } => {
                if self.phase != SessionPhase::Watching {
                    debug!(phase = ?self.phase, "dropping observer notice outside Watching");
                    return Effects::none();
                }
                self.status = message.clone();
                self.log.push(ChatMessage::system(message.clone()));
                Effects::event(TuringTestEvent::WatchUpdate { message })
            }
            ServerMessage::Error(message) => {
                // Surfaced as status only; no transition, no rollback.
                self.status = message.clone();
                Effects::event(TuringTestEvent::ServerError { message })
            }
        }
    }

    fn match_found(
        &mut self,
        session_id: SessionId,
        role: Role,
        message: String,
        ai_persona: Option<String>,
    ) -> Effects {
        // The server owns matchmaking: a match is accepted from any phase,
        // including a rematch while already chatting. The old countdown is
        // stopped before the new one starts.
        let seed = match &ai_persona {
            Some(persona) => ChatMessage::system(format!(
                "You are matched with an AI. Your persona is: \"{persona}\""
            )),
            None => ChatMessage::system(message.clone()),
        };
        self.timer.start(self.chat_duration);
        self.phase = SessionPhase::InChat;
        self.session_id = Some(session_id.clone());
        self.role = Some(role);
        self.persona = ai_persona.clone();
        self.status = message;
        self.outcome = None;
        self.watching = None;
        self.log.reseed(seed);
        debug!(%session_id, ?role, "match found, chat started");
        Effects {
            event: Some(TuringTestEvent::MatchStarted {
                session_id,
                role,
                persona: ai_persona,
            }),
            restart_ticker: true,
            ..Effects::default()
        }
    }

    fn game_end(&mut self, reason: GameEndReason, result: Option<String>) -> Effects {
        if self.phase != SessionPhase::InChat {
            // The wire payload carries no session id, so stale terminal
            // events are filtered by phase instead.
            debug!(?reason, phase = ?self.phase, "dropping terminal event outside InChat");
            return Effects::none();
        }
        // Stop the clock before recording the outcome: the machine must
        // never hold a running timer in Ended.
        self.timer.stop();
        self.phase = SessionPhase::Ended;
        self.status = STATUS_GAME_OVER.to_string();
        let outcome = GameOutcome::from_game_end(reason, result);
        let event = TuringTestEvent::GameEnded {
            reason: outcome.reason,
            result: outcome.result_text.clone(),
            incorrect: outcome.incorrect,
        };
        self.outcome = Some(outcome);
        debug!(?reason, "game ended");
        Effects::event(event)
    }

    fn watching_game(&mut self, session_id: SessionId, message: String) -> Effects {
        // Like a match, being queued as an observer is the server's call
        // and is accepted from any phase. Observer state is mutually
        // exclusive with a playable session, so any session remnants are
        // cleared and the countdown is parked at full.
        self.timer.reset(self.chat_duration);
        self.session_id = None;
        self.persona = None;
        self.outcome = None;
        self.phase = SessionPhase::Watching;
        self.watching = Some(WatchedGame {
            session_id: session_id.clone(),
        });
        self.status = message.clone();
        self.log.reseed(ChatMessage::system(message.clone()));
        debug!(%session_id, "queued as observer");
        Effects::event(TuringTestEvent::WatchingStarted {
            session_id,
            message,
        })
    }

    // ── Timer ───────────────────────────────────────────────────────

    /// Advance the countdown by one second.
    ///
    /// Expiry only stops the clock — the authoritative end-of-game always
    /// arrives as a `gameEnd` from the server, so a terminal event racing
    /// a local expiry can never be preempted by the timer.
    pub fn tick(&mut self) -> Effects {
        if self.timer.tick() {
            Effects::event(TuringTestEvent::TimerTick {
                remaining: self.timer.remaining(),
            })
        } else {
            Effects::none()
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// Clone the full renderable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            role: self.role,
            session_id: self.session_id.clone(),
            status: self.status.clone(),
            messages: self.log.entries.clone(),
            time_remaining: self.timer.remaining(),
            timer_running: self.timer.is_running(),
            outcome: self.outcome.clone(),
            watching: self.watching.clone(),
        }
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

    const DURATION: u32 = 90;

    fn machine() -> SessionState {
        SessionState::new(DURATION)
    }

    /// Drive the machine to InChat as the given role.
    fn matched(role: Role) -> SessionState {
        let mut m = machine();
        m.handle(UserAction::SelectRole(role));
        m.apply(ServerMessage::MatchFound {
            session_id: "sess-1".into(),
            role,
            message: "You are matched! Say hi.".into(),
            ai_persona: None,
        });
        m
    }

    fn game_end(reason: GameEndReason, result: Option<&str>) -> ServerMessage {
        ServerMessage::GameEnd {
            reason,
            result: result.map(Into::into),
        }
    }

    // ── Scenario A: role selection through match ────────────────────

    #[test]
    fn role_selection_emits_join_lobby_and_match_starts_chat() {
        let mut m = machine();
        assert_eq!(m.phase(), SessionPhase::NoRole);
        assert_eq!(m.status(), "Select your role to begin.");

        let fx = m.handle(UserAction::SelectRole(Role::Tester));
        assert_eq!(
            fx.outbound,
            Some(ClientMessage::JoinLobby { role: Role::Tester })
        );
        assert_eq!(m.phase(), SessionPhase::AwaitingMatch);
        assert_eq!(m.status(), "Joining the lobby...");

        let fx = m.apply(ServerMessage::MatchFound {
            session_id: "abc".into(),
            role: Role::Tester,
            message: "You are matched! Say hi.".into(),
            ai_persona: None,
        });
        assert!(fx.restart_ticker);
        assert_eq!(m.phase(), SessionPhase::InChat);
        assert_eq!(m.session_id().map(String::as_str), Some("abc"));
        assert_eq!(m.log().len(), 1);
        assert_eq!(
            m.log().entries()[0],
            ChatMessage::system("You are matched! Say hi.")
        );
        assert_eq!(m.timer().remaining(), DURATION);
        assert!(m.timer().is_running());
    }

    #[test]
    fn role_selection_is_ignored_once_a_role_exists() {
        let mut m = matched(Role::Tester);
        let fx = m.handle(UserAction::SelectRole(Role::TestedPerson));
        assert_eq!(fx, Effects::default());
        assert_eq!(m.role(), Some(Role::Tester));
    }

    // ── Scenario B: persona disclosure ──────────────────────────────

    #[test]
    fn persona_match_seeds_log_with_disclosure_not_raw_message() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::Tester));
        m.apply(ServerMessage::MatchFound {
            session_id: "abc".into(),
            role: Role::Tester,
            message: "You are matched!".into(),
            ai_persona: Some("a grumpy pirate".into()),
        });

        assert_eq!(m.log().len(), 1);
        let seed = &m.log().entries()[0];
        assert_eq!(seed.sender, MessageSender::System);
        assert!(seed.text.contains("grumpy pirate"));
        assert_ne!(seed.text, "You are matched!");
    }

    // ── Scenario C: send guards ─────────────────────────────────────

    #[test]
    fn blank_send_is_rejected_without_emission_or_append() {
        let mut m = matched(Role::Tester);
        let before = m.log().len();

        for blank in ["", "   ", "\t\n"] {
            let fx = m.handle(UserAction::SendChat(blank.into()));
            assert_eq!(fx, Effects::default());
        }
        assert_eq!(m.log().len(), before);
    }

    #[test]
    fn send_appends_local_message_and_emits_send_message() {
        let mut m = matched(Role::Tester);
        let fx = m.handle(UserAction::SendChat("hi".into()));

        assert_eq!(
            fx.outbound,
            Some(ClientMessage::SendMessage {
                session_id: "sess-1".into(),
                message: "hi".into(),
            })
        );
        let last = m.log().entries().last().unwrap();
        assert_eq!(last.sender, MessageSender::You);
        assert_eq!(last.text, "hi");
    }

    #[test]
    fn send_is_rejected_without_a_session_and_after_end() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::Tester));
        assert_eq!(m.handle(UserAction::SendChat("hi".into())), Effects::default());

        let mut m = matched(Role::Tester);
        m.apply(game_end(GameEndReason::Timeout, None));
        assert_eq!(m.handle(UserAction::SendChat("hi".into())), Effects::default());
    }

    // ── Scenario D: timeout ─────────────────────────────────────────

    #[test]
    fn timeout_stops_timer_and_offers_replay_without_guess() {
        let mut m = matched(Role::Tester);
        m.tick();
        assert!(m.timer().is_running());

        m.apply(game_end(GameEndReason::Timeout, None));
        assert_eq!(m.phase(), SessionPhase::Ended);
        assert!(!m.timer().is_running());
        assert_eq!(m.status(), "Game over!");

        let snap = m.snapshot();
        assert!(snap.can_replay());
        assert!(!snap.can_guess());
        assert!(!snap.can_send());
    }

    // ── Scenario E: judged guess ────────────────────────────────────

    #[test]
    fn incorrect_verdict_is_flagged_by_substring() {
        let mut m = matched(Role::Tester);
        m.apply(game_end(
            GameEndReason::Guess,
            Some("You guessed incorrectly!"),
        ));

        let outcome = m.outcome().unwrap();
        assert_eq!(outcome.incorrect, Some(true));
        assert!(m.snapshot().can_replay());
    }

    #[test]
    fn correct_verdict_is_not_flagged() {
        let mut m = matched(Role::Tester);
        m.apply(game_end(GameEndReason::Guess, Some("You guessed correctly!")));
        assert_eq!(m.outcome().unwrap().incorrect, Some(false));
    }

    #[test]
    fn non_guess_reasons_carry_no_correctness_flag() {
        let mut m = matched(Role::Tester);
        m.apply(game_end(
            GameEndReason::ReadyToGuess,
            Some("Time to decide."),
        ));
        assert_eq!(m.outcome().unwrap().incorrect, None);
    }

    // ── Scenario F: observer mode ───────────────────────────────────

    #[test]
    fn watching_game_enters_observer_mode_and_updates_append() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::TestedPerson));

        m.apply(ServerMessage::WatchingGame {
            session_id: "other".into(),
            message: "You are watching an ongoing game.".into(),
        });
        assert_eq!(m.phase(), SessionPhase::Watching);
        assert_eq!(m.log().len(), 1);

        m.apply(ServerMessage::GameComplete {
            message: "The game finished.".into(),
        });
        assert_eq!(m.phase(), SessionPhase::Watching);
        assert_eq!(m.log().len(), 2);
        assert_eq!(
            m.log().entries()[1],
            ChatMessage::system("The game finished.")
        );
    }

    #[test]
    fn observer_notice_is_ignored_outside_watching() {
        let mut m = matched(Role::Tester);
        let before = m.snapshot();
        let fx = m.apply(ServerMessage::GameComplete {
            message: "done".into(),
        });
        assert_eq!(fx, Effects::default());
        assert_eq!(m.snapshot(), before);
    }

    // ── Guess eligibility ───────────────────────────────────────────

    #[test]
    fn guess_emits_only_for_tester_with_ready_to_guess_outcome() {
        // Eligible path.
        let mut m = matched(Role::Tester);
        m.apply(game_end(GameEndReason::ReadyToGuess, Some("Decide now.")));
        let fx = m.handle(UserAction::MakeGuess(Guess::Ai));
        assert_eq!(
            fx.outbound,
            Some(ClientMessage::MakeGuess {
                session_id: "sess-1".into(),
                guess: Guess::Ai,
            })
        );

        // Wrong role.
        let mut m = matched(Role::TestedPerson);
        m.apply(game_end(GameEndReason::ReadyToGuess, Some("Decide now.")));
        assert_eq!(m.handle(UserAction::MakeGuess(Guess::Ai)), Effects::default());

        // Wrong reason.
        let mut m = matched(Role::Tester);
        m.apply(game_end(GameEndReason::Timeout, None));
        assert_eq!(
            m.handle(UserAction::MakeGuess(Guess::Human)),
            Effects::default()
        );

        // No session at all.
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::Tester));
        assert_eq!(m.handle(UserAction::MakeGuess(Guess::Ai)), Effects::default());
    }

    // ── Reset idempotence ───────────────────────────────────────────

    #[test]
    fn new_game_twice_yields_same_snapshot_as_once() {
        let mut m = matched(Role::Tester);
        m.handle(UserAction::SendChat("hello".into()));
        m.apply(game_end(GameEndReason::Timeout, None));

        let fx = m.handle(UserAction::NewGame(Role::TestedPerson));
        assert_eq!(
            fx.outbound,
            Some(ClientMessage::NewGame {
                role: Role::TestedPerson
            })
        );
        let once = m.snapshot();

        let fx = m.handle(UserAction::NewGame(Role::TestedPerson));
        assert_eq!(
            fx.outbound,
            Some(ClientMessage::NewGame {
                role: Role::TestedPerson
            })
        );
        assert_eq!(m.snapshot(), once);

        assert_eq!(once.phase, SessionPhase::AwaitingMatch);
        assert!(once.messages.is_empty());
        assert!(once.session_id.is_none());
        assert!(once.outcome.is_none());
        assert!(once.watching.is_none());
        assert_eq!(once.time_remaining, DURATION);
        assert!(!once.timer_running);
    }

    #[test]
    fn new_game_works_from_observer_mode() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::TestedPerson));
        m.apply(ServerMessage::WatchingGame {
            session_id: "other".into(),
            message: "Watching.".into(),
        });

        m.handle(UserAction::NewGame(Role::Tester));
        let snap = m.snapshot();
        assert_eq!(snap.phase, SessionPhase::AwaitingMatch);
        assert!(snap.watching.is_none());
        assert_eq!(snap.role, Some(Role::Tester));
    }

    // ── Append-only log ─────────────────────────────────────────────

    #[test]
    fn n_chat_events_append_exactly_n_entries_in_order() {
        let mut m = matched(Role::Tester);
        let seed = m.log().len();

        for i in 0..5 {
            m.apply(ServerMessage::NewMessage(ChatMessage {
                sender: MessageSender::Partner,
                text: format!("msg {i}"),
            }));
        }
        assert_eq!(m.log().len(), seed + 5);
        for (i, entry) in m.log().entries().iter().skip(seed).enumerate() {
            assert_eq!(entry.text, format!("msg {i}"));
        }
    }

    #[test]
    fn chat_event_without_session_is_ignored() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::Tester));
        let fx = m.apply(ServerMessage::NewMessage(ChatMessage {
            sender: MessageSender::Partner,
            text: "early".into(),
        }));
        assert_eq!(fx, Effects::default());
        assert!(m.log().is_empty());
    }

    // ── Timer vs. terminal event ────────────────────────────────────

    #[test]
    fn machine_never_holds_a_running_timer_in_ended() {
        for reason in [
            GameEndReason::Timeout,
            GameEndReason::ReadyToGuess,
            GameEndReason::Guess,
        ] {
            let mut m = matched(Role::Tester);
            m.tick();
            m.apply(game_end(reason, Some("result")));
            assert_eq!(m.phase(), SessionPhase::Ended);
            assert!(!m.timer().is_running());
            // A stale tick after the end changes nothing.
            let fx = m.tick();
            assert_eq!(fx, Effects::default());
        }
    }

    #[test]
    fn tick_emits_remaining_and_expiry_does_not_end_the_game() {
        let mut m = matched(Role::Tester);
        let fx = m.tick();
        assert_eq!(
            fx.event,
            Some(TuringTestEvent::TimerTick {
                remaining: DURATION - 1
            })
        );

        for _ in 1..DURATION {
            m.tick();
        }
        assert_eq!(m.timer().remaining(), 0);
        assert!(!m.timer().is_running());
        // Expiry is not authoritative: the phase stays InChat until the
        // server says otherwise.
        assert_eq!(m.phase(), SessionPhase::InChat);

        m.apply(game_end(GameEndReason::Timeout, None));
        assert_eq!(m.phase(), SessionPhase::Ended);
    }

    // ── Rematch while in chat ───────────────────────────────────────

    #[test]
    fn duplicate_match_found_restarts_the_session() {
        let mut m = matched(Role::Tester);
        m.handle(UserAction::SendChat("hello".into()));
        for _ in 0..10 {
            m.tick();
        }

        let fx = m.apply(ServerMessage::MatchFound {
            session_id: "sess-2".into(),
            role: Role::Tester,
            message: "Rematched.".into(),
            ai_persona: None,
        });
        assert!(fx.restart_ticker);
        assert_eq!(m.session_id().map(String::as_str), Some("sess-2"));
        assert_eq!(m.log().len(), 1);
        assert_eq!(m.timer().remaining(), DURATION);
        assert!(m.timer().is_running());
    }

    // ── Error notice ────────────────────────────────────────────────

    #[test]
    fn error_notice_sets_status_without_transition() {
        let mut m = matched(Role::Tester);
        let phase = m.phase();
        let log_len = m.log().len();

        let fx = m.apply(ServerMessage::Error("Partner unavailable".into()));
        assert_eq!(
            fx.event,
            Some(TuringTestEvent::ServerError {
                message: "Partner unavailable".into()
            })
        );
        assert_eq!(m.status(), "Partner unavailable");
        assert_eq!(m.phase(), phase);
        assert_eq!(m.log().len(), log_len);
    }

    #[test]
    fn waiting_notice_updates_status_only() {
        let mut m = machine();
        m.handle(UserAction::SelectRole(Role::Tester));
        m.apply(ServerMessage::WaitingForPartner(
            "Waiting for a partner...".into(),
        ));
        assert_eq!(m.phase(), SessionPhase::AwaitingMatch);
        assert_eq!(m.status(), "Waiting for a partner...");
        assert!(m.log().is_empty());
    }
}
