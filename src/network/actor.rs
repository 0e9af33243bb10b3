//! Match Actor
//!
//! One tokio task per match. The task owns the [`MatchEngine`] outright and
//! is the only thing that ever touches it: commands arrive over an mpsc
//! mailbox, timer wakes come from a single re-armed sleep, and both are
//! handled one at a time so updates never overlap.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::game::config::GameMode;
use crate::game::engine::{MatchEngine, Wake};
use crate::game::input::Direction;
use crate::game::state::{MatchPhase, PlayerId};
use crate::network::ports::{MatchRecord, Ports};

// =============================================================================
// CLOCK
// =============================================================================

/// Wall-clock milliseconds anchored to the tokio clock.
///
/// Reading time through tokio keeps paused-time tests deterministic while
/// still handing the engine unix-epoch timestamps.
#[derive(Debug, Clone, Copy)]
pub struct MatchClock {
    origin: Instant,
    origin_ms: u64,
}

impl MatchClock {
    /// Anchor to the current time.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            origin_ms: Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// Current wall-clock time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.origin_ms + self.origin.elapsed().as_millis() as u64
    }

    /// Tokio instant matching a wall-clock millisecond.
    pub fn instant_at(&self, ms: u64) -> Instant {
        self.origin + Duration::from_millis(ms.saturating_sub(self.origin_ms))
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Messages accepted by a match task. Each carries a reply telling the
/// caller whether the engine accepted it.
#[derive(Debug)]
pub enum MatchCommand {
    /// Choose the game mode.
    SelectMode {
        /// Requested mode.
        mode: GameMode,
        /// Accepted?
        reply: oneshot::Sender<bool>,
    },
    /// Key edge from a player.
    Key {
        /// Sender.
        player: PlayerId,
        /// Which key.
        direction: Direction,
        /// Down (true) or up (false).
        pressed: bool,
        /// Accepted?
        reply: oneshot::Sender<bool>,
    },
    /// Player left the match.
    Leave {
        /// Leaving player.
        player: PlayerId,
        /// Accepted?
        reply: oneshot::Sender<bool>,
    },
}

// =============================================================================
// ACTOR
// =============================================================================

/// Owns a match and drives it until teardown.
pub struct MatchActor {
    engine: MatchEngine,
    commands: mpsc::Receiver<MatchCommand>,
    phase: watch::Sender<MatchPhase>,
    ports: Ports,
    clock: MatchClock,
}

impl MatchActor {
    /// Wrap an engine with its mailbox and phase publisher.
    pub fn new(
        engine: MatchEngine,
        commands: mpsc::Receiver<MatchCommand>,
        phase: watch::Sender<MatchPhase>,
        ports: Ports,
        clock: MatchClock,
    ) -> Self {
        Self {
            engine,
            commands,
            phase,
            ports,
            clock,
        }
    }

    /// Run until the engine reports no further wakes, then save the result
    /// and close the match channel.
    pub async fn run(mut self) {
        let label = hex::encode(&self.engine.id()[..4]);
        let now = self.clock.now_ms();
        let mut deadline = match self.engine.on_timer(now) {
            Wake::After(ms) => self.clock.instant_at(now + ms),
            Wake::Stop => Instant::now(),
        };
        self.flush();

        let mut mailbox_open = true;
        loop {
            tokio::select! {
                command = self.commands.recv(), if mailbox_open => {
                    match command {
                        Some(command) => {
                            if let Some(rearm) = self.handle(command) {
                                deadline = rearm;
                            }
                        }
                        None => {
                            // Registry dropped its handle; keep playing on timers.
                            mailbox_open = false;
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    let now = self.clock.now_ms();
                    let wake = self.engine.on_timer(now);
                    self.flush();
                    match wake {
                        Wake::After(ms) => deadline = self.clock.instant_at(now + ms),
                        Wake::Stop => break,
                    }
                }
            }
        }

        self.teardown().await;
        debug!("Match {} task exiting", label);
    }

    /// Apply one command. Returns a new deadline when the timer must be
    /// re-armed.
    fn handle(&mut self, command: MatchCommand) -> Option<Instant> {
        let now = self.clock.now_ms();
        let (accepted, rearm, reply) = match command {
            MatchCommand::SelectMode { mode, reply } => {
                (self.engine.select_mode(mode), None, reply)
            }
            MatchCommand::Key { player, direction, pressed, reply } => {
                let wake = if pressed {
                    self.engine.key_down(&player, direction, now)
                } else {
                    self.engine.key_up(&player, direction, now)
                };
                let rearm = match wake {
                    Some(Wake::After(ms)) => Some(self.clock.instant_at(now + ms)),
                    Some(Wake::Stop) => Some(Instant::now()),
                    None => None,
                };
                (wake.is_some(), rearm, reply)
            }
            MatchCommand::Leave { player, reply } => {
                let accepted = self.engine.player_left(&player);
                // Forfeits are finalized on the very next wake.
                (accepted, accepted.then(Instant::now), reply)
            }
        };

        if accepted {
            self.flush();
        }
        let _ = reply.send(accepted);
        rearm
    }

    /// Forward queued events and publish the phase.
    fn flush(&mut self) {
        let id = *self.engine.id();
        for event in self.engine.take_events() {
            self.ports.broadcast.broadcast(&id, &event);
        }

        let phase = self.engine.phase();
        self.phase.send_if_modified(|current| {
            if *current != phase {
                *current = phase;
                true
            } else {
                false
            }
        });
    }

    async fn teardown(&mut self) {
        let id = *self.engine.id();
        let label = hex::encode(&id[..4]);
        let result = self.engine.result();
        let record = MatchRecord::from_result(id, &result, Utc::now());

        if let Err(e) = self.ports.persistence.save_match(record).await {
            error!("Match {} failed to save result: {}", label, e);
        }
        self.ports.broadcast.disconnect_all(&id);

        info!(
            "Match {} torn down, winner {} ({}:{})",
            label,
            result.winner.short(),
            result.winner_score,
            result.loser_score
        );
    }
}
