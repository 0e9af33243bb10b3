//! Match State Definitions
//!
//! The mutable continuous and discrete state of one match. Owned by the
//! engine and mutated only from inside its update path.

use serde::{Serialize, Deserialize};

use crate::game::config::MatchConfig;
use crate::game::input::KeyState;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique match identifier (UUID as bytes).
pub type MatchId = [u8; 16];

/// Unique player identifier (UUID as bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// A participant as handed over by the lobby: identity and pre-match rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Player identifier.
    pub id: PlayerId,
    /// Rating before this match.
    pub rating: i32,
}

impl PlayerInfo {
    /// Create a participant.
    pub const fn new(id: PlayerId, rating: i32) -> Self {
        Self { id, rating }
    }
}

/// Which side of the table a player sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seat {
    /// Player 1, left paddle.
    One,
    /// Player 2, right paddle.
    Two,
}

impl Seat {
    /// Array index for per-seat storage.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }

    /// The other seat.
    #[inline]
    pub fn opponent(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// Match lifecycle phase, in the order a match walks through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Players may pick a game mode.
    ModeSelect,
    /// Frozen pre-round countdown.
    Countdown,
    /// Ball in play.
    Running,
    /// Final score decided, waiting to tear down.
    Finished,
    /// Results saved, channel closed.
    Torndown,
}

impl MatchPhase {
    /// Whether a player leaving still forfeits the match.
    pub fn accepts_forfeit(self) -> bool {
        matches!(self, MatchPhase::ModeSelect | MatchPhase::Countdown | MatchPhase::Running)
    }
}

// =============================================================================
// BALL / PADDLES / SPEED
// =============================================================================

/// Ball position and velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// Center X.
    pub x: f64,
    /// Center Y.
    pub y: f64,
    /// X velocity (px/ms).
    pub vx: f64,
    /// Y velocity (px/ms).
    pub vy: f64,
}

/// Per-round speed ratchet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedState {
    /// Current ball speed limit (|vx| in speed mode, steering cap in all modes).
    pub ball_limit: f64,
    /// Current paddle speed (px/ms).
    pub paddle: f64,
}

// =============================================================================
// SCOREBOARD
// =============================================================================

/// Score value marking a player who left before the end.
pub const FORFEIT: i32 = -1;

/// Score pair, `[player 1, player 2]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard(pub [i32; 2]);

impl Scoreboard {
    /// Score of a seat.
    #[inline]
    pub fn get(&self, seat: Seat) -> i32 {
        self.0[seat.index()]
    }

    /// Award one point.
    pub fn award(&mut self, seat: Seat) {
        let score = &mut self.0[seat.index()];
        if *score != FORFEIT {
            *score += 1;
        }
    }

    /// Mark a seat as forfeited.
    pub fn forfeit(&mut self, seat: Seat) {
        self.0[seat.index()] = FORFEIT;
    }

    /// Whether either side reached the threshold by playing.
    ///
    /// The forfeit sentinel never counts towards the threshold.
    pub fn has_winner(&self, threshold: i32) -> bool {
        self.0.iter().any(|&s| s != FORFEIT && s >= threshold)
    }

    /// Whether any seat forfeited.
    pub fn has_forfeit(&self) -> bool {
        self.0.contains(&FORFEIT)
    }

    /// Seat that won: higher score, and any forfeit loses.
    ///
    /// A tie (only reachable if both left) goes to player 2, as does any
    /// case where player 1 does not strictly lead.
    pub fn leader(&self) -> Seat {
        if self.0[0] > self.0[1] {
            Seat::One
        } else {
            Seat::Two
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete mutable state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Current lifecycle phase.
    pub phase: MatchPhase,
    /// Ball.
    pub ball: Ball,
    /// Top edge Y of each paddle, `[player 1, player 2]`.
    pub paddles: [f64; 2],
    /// Scores.
    pub scores: Scoreboard,
    /// Points played so far.
    pub round: u32,
    /// Speed ratchet.
    pub speed: SpeedState,
    /// Key hold start times.
    pub keys: KeyState,
    /// Wall-clock ms when the current timed phase ends.
    pub round_deadline: u64,
    /// Wall-clock ms of the last update.
    pub last_update: u64,
    /// Whether the current countdown has reset the table yet.
    pub round_ready: bool,
}

impl MatchState {
    /// Fresh state at match creation, table centered and ball at rest.
    pub fn new(config: &MatchConfig, now: u64) -> Self {
        let paddle_y = (config.canvas_height - config.paddle_height) / 2.0;
        Self {
            phase: MatchPhase::ModeSelect,
            ball: Ball {
                x: config.canvas_width / 2.0,
                y: config.canvas_height / 2.0,
                vx: 0.0,
                vy: 0.0,
            },
            paddles: [paddle_y, paddle_y],
            scores: Scoreboard::default(),
            round: 0,
            speed: SpeedState {
                ball_limit: 0.0,
                paddle: config.paddle_base_speed,
            },
            keys: KeyState::default(),
            round_deadline: now,
            last_update: now,
            round_ready: false,
        }
    }

    /// Ball and both paddles inside the canvas.
    pub fn in_bounds(&self, config: &MatchConfig) -> bool {
        let arena = config.arena();
        let ball_ok = self.ball.x >= 0.0
            && self.ball.x <= arena.width
            && self.ball.y >= arena.top_wall()
            && self.ball.y <= arena.bottom_wall();
        let paddles_ok = self
            .paddles
            .iter()
            .all(|&p| p >= 0.0 && p <= arena.paddle_max_y());
        ball_ok && paddles_ok
    }
}
