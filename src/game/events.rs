//! Match Events
//!
//! Everything the engine tells the outside world. Events are queued by the
//! engine during an update and drained by the match actor, which forwards
//! them to the broadcast port. All messages serialize to JSON with a `type`
//! tag, matching what browser clients listen for.

use serde::{Serialize, Deserialize};

use crate::game::config::GameMode;
use crate::game::state::{MatchState, PlayerId};

/// Full continuous state of the table, enough for a client to extrapolate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Player 1 paddle top edge.
    pub paddle1_y: f64,
    /// Ball center X.
    pub ball_x: f64,
    /// Ball center Y.
    pub ball_y: f64,
    /// Player 2 paddle top edge.
    pub paddle2_y: f64,
    /// Ball X velocity (px/ms).
    pub ball_vel_x: f64,
    /// Ball Y velocity (px/ms).
    pub ball_vel_y: f64,
    /// Current paddle speed (px/ms).
    pub paddle_speed: f64,
    /// Key hold start times, 0 = released.
    pub key_state: [u64; 4],
    /// Wall-clock ms this state is valid at.
    pub timestamp: u64,
}

impl Snapshot {
    /// Capture the state as of its last update.
    pub fn capture(state: &MatchState) -> Self {
        Self {
            paddle1_y: state.paddles[0],
            ball_x: state.ball.x,
            ball_y: state.ball.y,
            paddle2_y: state.paddles[1],
            ball_vel_x: state.ball.vx,
            ball_vel_y: state.ball.vy,
            paddle_speed: state.speed.paddle,
            key_state: state.keys.0,
            timestamp: state.last_update,
        }
    }

    /// Same snapshot with the ball shown at rest.
    pub fn frozen(mut self) -> Self {
        self.ball_vel_x = 0.0;
        self.ball_vel_y = 0.0;
        self
    }
}

/// Events pushed to every socket in a match channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MatchEvent {
    /// Both players are seated.
    #[serde(rename_all = "camelCase")]
    Matched {
        /// Player 1 UUID.
        player1_id: String,
        /// Player 2 UUID.
        player2_id: String,
    },

    /// Mode is locked in, the first countdown begins.
    #[serde(rename_all = "camelCase")]
    GameStart {
        /// Chosen game mode.
        mode: GameMode,
        /// Player 1 UUID.
        player1_id: String,
        /// Player 2 UUID.
        player2_id: String,
    },

    /// Table snapshot.
    SyncData(Snapshot),

    /// Countdown progress.
    #[serde(rename_all = "camelCase")]
    Countdown {
        /// Wall-clock ms of this update.
        timestamp: u64,
        /// Milliseconds left until the ball moves.
        remaining_ms: u64,
    },

    /// A point was scored.
    #[serde(rename_all = "camelCase")]
    ScoreInfo {
        /// Table at the moment of the point, keys cleared.
        snapshot: Snapshot,
        /// Player 1 score.
        score1: i32,
        /// Player 2 score.
        score2: i32,
    },

    /// Final score; `-1` marks a forfeit.
    #[serde(rename_all = "camelCase")]
    Finished {
        /// Player 1 score.
        score1: i32,
        /// Player 2 score.
        score2: i32,
    },
}

impl MatchEvent {
    /// Build the `matched` announcement.
    pub fn matched(player1: PlayerId, player2: PlayerId) -> Self {
        MatchEvent::Matched {
            player1_id: player1.to_uuid_string(),
            player2_id: player2.to_uuid_string(),
        }
    }

    /// Build the `gameStart` announcement.
    pub fn game_start(mode: GameMode, player1: PlayerId, player2: PlayerId) -> Self {
        MatchEvent::GameStart {
            mode,
            player1_id: player1.to_uuid_string(),
            player2_id: player2.to_uuid_string(),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            MatchEvent::Matched { .. } => "matched",
            MatchEvent::GameStart { .. } => "gameStart",
            MatchEvent::SyncData(_) => "syncData",
            MatchEvent::Countdown { .. } => "countdown",
            MatchEvent::ScoreInfo { .. } => "scoreInfo",
            MatchEvent::Finished { .. } => "finished",
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
