//! Input Reconciliation
//!
//! Players send key-down / key-up edges, not per-frame samples. The server
//! remembers when each key started being held and converts the elapsed
//! wall-clock time into paddle travel whenever the match is updated, so
//! paddle motion does not depend on how often updates happen.

use serde::{Serialize, Deserialize};

use crate::core::physics::Arena;
use crate::game::state::Seat;

/// Paddle direction key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards y = 0.
    Up,
    /// Towards y = canvas height.
    Down,
}

/// Slot of a key in [`KeyState`]: P1 up, P1 down, P2 up, P2 down.
#[inline]
pub fn key_slot(seat: Seat, direction: Direction) -> usize {
    let base = seat.index() * 2;
    match direction {
        Direction::Up => base,
        Direction::Down => base + 1,
    }
}

/// Hold start timestamps (wall-clock ms) for the four keys, 0 = released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState(pub [u64; 4]);

impl KeyState {
    /// Record a key press at `now`.
    pub fn press(&mut self, seat: Seat, direction: Direction, now: u64) {
        self.0[key_slot(seat, direction)] = now;
    }

    /// Record a key release.
    pub fn release(&mut self, seat: Seat, direction: Direction) {
        self.0[key_slot(seat, direction)] = 0;
    }

    /// Whether a key is currently held.
    #[inline]
    pub fn is_held(&self, seat: Seat, direction: Direction) -> bool {
        self.0[key_slot(seat, direction)] != 0
    }

    /// Release every key.
    pub fn clear(&mut self) {
        self.0 = [0; 4];
    }

    /// The single direction a seat is steering, if exactly one key is held.
    pub fn steering(&self, seat: Seat) -> Option<Direction> {
        match (self.is_held(seat, Direction::Up), self.is_held(seat, Direction::Down)) {
            (true, false) => Some(Direction::Up),
            (false, true) => Some(Direction::Down),
            _ => None,
        }
    }

    /// Take the hold time elapsed since the last call for every key.
    ///
    /// Held keys whose start lies before `now` report `now - start` and have
    /// their start advanced to `now`, so the same interval is never counted
    /// twice. Keys pressed at or after `now` report 0.
    pub fn drain_elapsed(&mut self, now: u64) -> [u64; 4] {
        let mut elapsed = [0u64; 4];
        for (slot, start) in self.0.iter_mut().enumerate() {
            if *start != 0 && now > *start {
                elapsed[slot] = now - *start;
                *start = now;
            }
        }
        elapsed
    }
}

/// Move both paddles by the drained key hold times.
///
/// Each paddle ends clamped to `[0, canvas_height - paddle_height]`.
pub fn apply_paddle_travel(
    paddles: &mut [f64; 2],
    elapsed: [u64; 4],
    paddle_speed: f64,
    arena: &Arena,
) {
    for seat in [Seat::One, Seat::Two] {
        let up = elapsed[key_slot(seat, Direction::Up)] as f64;
        let down = elapsed[key_slot(seat, Direction::Down)] as f64;
        if up == 0.0 && down == 0.0 {
            continue;
        }
        let paddle = &mut paddles[seat.index()];
        *paddle += paddle_speed * (down - up);
        *paddle = paddle.clamp(0.0, arena.paddle_max_y());
    }
}
