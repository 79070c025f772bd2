//! The match session: one best-of-three game between two endpoints.
//!
//! ```text
//!   RoundInProgress ──(both choices in)──→ RoundResolved
//!         ↑                                    │
//!         └────────(next round_start)──────────┤
//!                                              ↓
//!                                            Ended
//! ```
//!
//! Round state lives behind one mutex. It is held only while mutating
//! that state; every event is delivered after it is released, and the
//! session-ended notification runs on a fresh task so the observer can
//! take its own lock without ever nesting inside this one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use skirmish_protocol::{Choice, EndpointId, Outcome, ServerEvent, SessionId};
use skirmish_session::{Endpoint, Membership};
use tokio_util::sync::CancellationToken;

use crate::{MatchConfig, MatchError, rules};

/// Told when a session reaches its terminal state.
///
/// Called from a detached task, never from inside the session's lock.
pub trait SessionObserver: Send + Sync + 'static {
    fn session_ended(&self, session_id: SessionId);
}

/// What a successful [`MatchSession::submit_choice`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The choice was recorded; the opponent has not chosen yet.
    Recorded,
    /// The round resolved and round `next_round` is next.
    RoundResolved { next_round: u32 },
    /// The round resolved and the game is over.
    GameEnded,
}

struct RoundState {
    round: u32,
    wins: [u32; 2],
    choices: [Option<Choice>; 2],
    ended: bool,
}

/// Computed under the lock, delivered after it.
enum Resolution {
    Pending,
    NextRound {
        results: [ServerEvent; 2],
        next_round: u32,
    },
    Ended {
        results: [ServerEvent; 2],
        wins: [u32; 2],
    },
}

/// One game between exactly two endpoints.
pub struct MatchSession {
    id: SessionId,
    players: [Arc<Endpoint>; 2],
    config: MatchConfig,
    state: Mutex<RoundState>,
    cancel: CancellationToken,
    observer: Weak<dyn SessionObserver>,
}

impl MatchSession {
    /// Creates a session and marks both players as in it.
    ///
    /// Nothing is sent until [`start`](Self::start). The session's token
    /// is a child of `parent`.
    pub fn new(
        id: SessionId,
        players: [Arc<Endpoint>; 2],
        config: MatchConfig,
        parent: &CancellationToken,
        observer: Weak<dyn SessionObserver>,
    ) -> Arc<Self> {
        for player in &players {
            player.set_membership(Membership::InMatch(id));
        }
        Arc::new(Self {
            id,
            players,
            config,
            state: Mutex::new(RoundState {
                round: 1,
                wins: [0, 0],
                choices: [None, None],
                ended: false,
            }),
            cancel: parent.child_token(),
            observer,
        })
    }

    /// Opens round one.
    pub fn start(&self) {
        self.start_round(1);
    }

    /// Records `endpoint_id`'s choice for the current round and resolves
    /// the round once both players have chosen.
    ///
    /// An unrecognised `choice` is answered with an `error` event to that
    /// player and nothing is recorded. Choosing twice in a round replaces
    /// the earlier choice.
    ///
    /// # Errors
    /// - `NotAPlayer` if the endpoint is not in this session.
    /// - `Ended` if the game is already over; nothing is sent.
    /// - `InvalidChoice` for an unrecognised value.
    pub fn submit_choice(
        self: &Arc<Self>,
        endpoint_id: &EndpointId,
        choice: &str,
    ) -> Result<Progress, MatchError> {
        let seat = self
            .seat_of(endpoint_id)
            .ok_or_else(|| MatchError::NotAPlayer(endpoint_id.clone(), self.id))?;
        if self.is_ended() {
            return Err(MatchError::Ended(self.id));
        }

        let Ok(choice) = choice.parse::<Choice>() else {
            let err = MatchError::InvalidChoice(choice.to_string());
            self.players[seat].enqueue(ServerEvent::error(err.to_string()));
            return Err(err);
        };

        let resolution = self.record(seat, choice)?;
        match resolution {
            Resolution::Pending => Ok(Progress::Recorded),
            Resolution::NextRound {
                results,
                next_round,
            } => {
                self.deliver_pair(results);
                self.schedule_round(next_round);
                Ok(Progress::RoundResolved { next_round })
            }
            Resolution::Ended { results, wins } => {
                self.deliver_pair(results);
                self.finish(wins);
                Ok(Progress::GameEnded)
            }
        }
    }

    /// Ends the game because `endpoint_id` left. The remaining player
    /// wins and is told the score.
    ///
    /// # Errors
    /// `NotAPlayer` or `Ended`, as for `submit_choice`.
    pub fn forfeit(&self, endpoint_id: &EndpointId) -> Result<(), MatchError> {
        let seat = self
            .seat_of(endpoint_id)
            .ok_or_else(|| MatchError::NotAPlayer(endpoint_id.clone(), self.id))?;
        let wins = {
            let mut state = self.lock();
            if state.ended {
                return Err(MatchError::Ended(self.id));
            }
            state.ended = true;
            state.wins
        };

        let winner = 1 - seat;
        self.release_players();
        self.players[winner].enqueue(ServerEvent::GameEnded {
            result: Outcome::Win,
            score: format!("{}-{}", wins[winner], wins[seat]),
        });
        tracing::info!(
            session_id = %self.id,
            %endpoint_id,
            winner = %self.players[winner].id(),
            "player left, game forfeited"
        );

        self.notify_ended();
        Ok(())
    }

    /// Cancels pending round starts and refuses further choices.
    /// Safe to call any number of times, before or after the game ends.
    pub fn close(&self) {
        self.lock().ended = true;
        self.cancel.cancel();
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The current round number, starting at 1.
    pub fn round(&self) -> u32 {
        self.lock().round
    }

    /// Round wins so far, in player order.
    pub fn wins(&self) -> [u32; 2] {
        self.lock().wins
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    pub fn players(&self) -> &[Arc<Endpoint>; 2] {
        &self.players
    }

    // -- internals --------------------------------------------------------

    fn seat_of(&self, endpoint_id: &EndpointId) -> Option<usize> {
        self.players.iter().position(|p| p.id() == endpoint_id)
    }

    /// The only place round state changes. Resolves the round exactly
    /// once: the check for "both chosen" and the reset happen under the
    /// same lock.
    fn record(&self, seat: usize, choice: Choice) -> Result<Resolution, MatchError> {
        let mut state = self.lock();
        if state.ended {
            return Err(MatchError::Ended(self.id));
        }
        state.choices[seat] = Some(choice);

        let [Some(a), Some(b)] = state.choices else {
            tracing::debug!(session_id = %self.id, round = state.round, seat, "choice recorded");
            return Ok(Resolution::Pending);
        };
        state.choices = [None, None];

        let (outcome_a, outcome_b) = rules::resolve(a, b);
        match outcome_a {
            Outcome::Win => state.wins[0] += 1,
            Outcome::Lose => state.wins[1] += 1,
            Outcome::Draw => {}
        }

        tracing::info!(
            session_id = %self.id,
            round = state.round,
            choices = %format_args!("{a} vs {b}"),
            score = %format_args!("{}-{}", state.wins[0], state.wins[1]),
            "round resolved"
        );

        let results = [
            ServerEvent::RoundResult {
                result: outcome_a,
                your_choice: a,
                opponent_choice: b,
            },
            ServerEvent::RoundResult {
                result: outcome_b,
                your_choice: b,
                opponent_choice: a,
            },
        ];

        let over = state.wins.iter().any(|&w| w >= self.config.wins_required)
            || state.round >= self.config.max_rounds;
        if over {
            state.ended = true;
            Ok(Resolution::Ended {
                results,
                wins: state.wins,
            })
        } else {
            state.round += 1;
            Ok(Resolution::NextRound {
                results,
                next_round: state.round,
            })
        }
    }

    fn deliver_pair(&self, events: [ServerEvent; 2]) {
        for (player, event) in self.players.iter().zip(events) {
            player.enqueue(event);
        }
    }

    fn schedule_round(self: &Arc<Self>, round: u32) {
        let delay = self.config.round_delay;
        if delay.is_zero() {
            self.start_round(round);
            return;
        }

        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = session.cancel.cancelled() => {
                    tracing::debug!(session_id = %session.id, round, "round start cancelled");
                }
                _ = tokio::time::sleep(delay) => session.start_round(round),
            }
        });
    }

    fn start_round(&self, round: u32) {
        {
            let state = self.lock();
            if state.ended || state.round != round {
                return;
            }
        }
        tracing::debug!(session_id = %self.id, round, "round started");
        for player in &self.players {
            player.enqueue(ServerEvent::RoundStart {
                round_number: round,
            });
        }
    }

    fn finish(&self, wins: [u32; 2]) {
        let (result_a, result_b) = rules::overall(wins[0], wins[1]);

        // Released before the final event goes out, so a player who
        // answers `game_ended` with `play_again` is already free.
        self.release_players();
        self.deliver_pair([
            ServerEvent::GameEnded {
                result: result_a,
                score: format!("{}-{}", wins[0], wins[1]),
            },
            ServerEvent::GameEnded {
                result: result_b,
                score: format!("{}-{}", wins[1], wins[0]),
            },
        ]);

        let winner = match result_a {
            Outcome::Win => self.players[0].name(),
            Outcome::Lose => self.players[1].name(),
            Outcome::Draw => "draw".to_string(),
        };
        tracing::info!(
            session_id = %self.id,
            score = %format_args!("{}-{}", wins[0], wins[1]),
            %winner,
            "game ended"
        );

        self.notify_ended();
    }

    fn release_players(&self) {
        for player in &self.players {
            player.leave_session(self.id);
        }
    }

    fn notify_ended(&self) {
        let observer = self.observer.clone();
        let session_id = self.id;
        let notify = move || {
            if let Some(observer) = observer.upgrade() {
                observer.session_ended(session_id);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { notify() });
            }
            // No runtime (teardown from a plain thread): the caller holds
            // no lock here, so notifying inline is safe.
            Err(_) => notify(),
        }
    }

    // Every critical section leaves the round state consistent.
    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MatchSession")
            .field("id", &self.id)
            .field("players", &[self.players[0].id(), self.players[1].id()])
            .field("round", &state.round)
            .field("wins", &state.wins)
            .field("ended", &state.ended)
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
