//! Physics Kernel
//!
//! Pure collision and integration functions for the ball and paddles.
//! Nothing here holds state; the match engine feeds in positions and
//! velocities and applies the results.
//!
//! Units are canvas pixels and milliseconds, so velocities are px/ms.

/// Wake margin added to every predicted collision time (ms).
///
/// The timer must fire strictly after the ball has crossed a plane,
/// otherwise the crossing test would miss it and the match would spin.
pub const COLLISION_EPSILON_MS: f64 = 1.0;

/// Which horizontal wall the ball touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallHit {
    /// Top edge (y = 0 side).
    Top,
    /// Bottom edge (y = height side).
    Bottom,
}

/// Which paddle plane the ball reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneHit {
    /// Player 1's plane on the left.
    Left,
    /// Player 2's plane on the right.
    Right,
}

/// Canvas geometry needed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    /// Canvas width.
    pub width: f64,
    /// Canvas height.
    pub height: f64,
    /// Ball radius.
    pub ball_radius: f64,
    /// Paddle width (thickness along X).
    pub paddle_width: f64,
    /// Paddle height (span along Y).
    pub paddle_height: f64,
}

impl Arena {
    /// X coordinate of the ball center when touching player 1's paddle face.
    #[inline]
    pub fn left_plane(&self) -> f64 {
        self.ball_radius + self.paddle_width
    }

    /// X coordinate of the ball center when touching player 2's paddle face.
    #[inline]
    pub fn right_plane(&self) -> f64 {
        self.width - self.ball_radius - self.paddle_width
    }

    /// Smallest ball center Y.
    #[inline]
    pub fn top_wall(&self) -> f64 {
        self.ball_radius
    }

    /// Largest ball center Y.
    #[inline]
    pub fn bottom_wall(&self) -> f64 {
        self.height - self.ball_radius
    }

    /// Highest Y a paddle's top edge may take.
    #[inline]
    pub fn paddle_max_y(&self) -> f64 {
        self.height - self.paddle_height
    }
}

/// Advance a coordinate by `velocity * dt`.
#[inline]
pub fn integrate(position: f64, velocity: f64, dt: f64) -> f64 {
    position + velocity * dt
}

/// Reflect a coordinate about a boundary.
///
/// Unlike clamping, this keeps the overshoot: a ball that travelled 3px
/// past the wall ends up 3px inside it, as if it had bounced mid-step.
#[inline]
pub fn mirror(position: f64, boundary: f64) -> f64 {
    2.0 * boundary - position
}

/// Detect a top/bottom wall contact.
pub fn wall_hit(arena: &Arena, y: f64) -> Option<WallHit> {
    if y >= arena.bottom_wall() {
        Some(WallHit::Bottom)
    } else if y <= arena.top_wall() {
        Some(WallHit::Top)
    } else {
        None
    }
}

/// Detect a paddle plane crossing.
pub fn plane_hit(arena: &Arena, x: f64) -> Option<PlaneHit> {
    if x <= arena.left_plane() {
        Some(PlaneHit::Left)
    } else if x >= arena.right_plane() {
        Some(PlaneHit::Right)
    } else {
        None
    }
}

/// Boundary a wall hit reflects about.
#[inline]
pub fn wall_boundary(arena: &Arena, hit: WallHit) -> f64 {
    match hit {
        WallHit::Top => arena.top_wall(),
        WallHit::Bottom => arena.bottom_wall(),
    }
}

/// Boundary a paddle hit reflects about.
#[inline]
pub fn plane_boundary(arena: &Arena, hit: PlaneHit) -> f64 {
    match hit {
        PlaneHit::Left => arena.left_plane(),
        PlaneHit::Right => arena.right_plane(),
    }
}

/// Does the paddle whose top edge sits at `paddle_y` cover `ball_y`?
#[inline]
pub fn paddle_covers(arena: &Arena, paddle_y: f64, ball_y: f64) -> bool {
    ball_y >= paddle_y && ball_y <= paddle_y + arena.paddle_height
}

/// Milliseconds until the ball reaches the paddle plane it is heading to.
pub fn time_to_plane(arena: &Arena, x: f64, vx: f64) -> f64 {
    if vx > 0.0 {
        (arena.right_plane() - x) / vx
    } else if vx < 0.0 {
        (x - arena.left_plane()) / -vx
    } else {
        f64::INFINITY
    }
}

/// Milliseconds until the ball reaches the wall it is heading to.
///
/// A ball with no vertical velocity never hits a wall.
pub fn time_to_wall(arena: &Arena, y: f64, vy: f64) -> f64 {
    if vy > 0.0 {
        (arena.bottom_wall() - y) / vy
    } else if vy < 0.0 {
        (y - arena.top_wall()) / -vy
    } else {
        f64::INFINITY
    }
}

/// Predicted delay (ms) until the next collision of either kind, plus
/// [`COLLISION_EPSILON_MS`].
pub fn next_event_delay(arena: &Arena, x: f64, y: f64, vx: f64, vy: f64) -> f64 {
    let horizontal = time_to_plane(arena, x, vx);
    let vertical = time_to_wall(arena, y, vy);
    horizontal.min(vertical).max(0.0) + COLLISION_EPSILON_MS
}
