//! Match Configuration
//!
//! Geometry and speed constants fixed for the lifetime of a match, plus the
//! mode and match-type enums chosen around them.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::physics::Arena;

/// Gameplay variant, picked by a player during mode select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Constant ball speed, X velocity simply flips on a paddle hit.
    #[default]
    Default,
    /// Faster serve, ball and paddles speed up 8% per paddle hit.
    Speed,
}

impl GameMode {
    /// Serve speed multiplier applied to `canvas_width / 2000`.
    pub fn serve_multiplier(self) -> f64 {
        match self {
            GameMode::Default => 1.2,
            GameMode::Speed => 1.4,
        }
    }
}

/// Kind of match, decides whether ratings move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Competitive, rated.
    Ranked,
    /// Quick play, unrated.
    Casual,
    /// Invite-only match between friends, unrated.
    Private,
}

impl MatchType {
    /// Whether the rating engine runs for this match.
    pub fn is_competitive(self) -> bool {
        matches!(self, MatchType::Ranked)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A dimension or speed was zero, negative or not finite.
    #[error("{0} must be a positive finite number")]
    NonPositive(&'static str),

    /// Paddles or ball do not fit on the canvas.
    #[error("geometry does not fit the canvas: {0}")]
    Geometry(&'static str),

    /// A base speed exceeds its ceiling.
    #[error("{0} exceeds its ceiling")]
    SpeedAboveCeiling(&'static str),

    /// Environment override could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Immutable per-match configuration.
///
/// Speeds are in canvas pixels per millisecond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Canvas width.
    pub canvas_width: f64,
    /// Canvas height.
    pub canvas_height: f64,
    /// Ball radius.
    pub ball_radius: f64,
    /// Paddle width.
    pub paddle_width: f64,
    /// Paddle height.
    pub paddle_height: f64,
    /// Paddle speed at the start of every round.
    pub paddle_base_speed: f64,
    /// Paddle speed ceiling for the speed-up ratchet.
    pub paddle_speed_max: f64,
    /// Ball speed ceiling for the speed-up ratchet.
    pub ball_speed_max: f64,
    /// First score to reach this wins.
    pub winning_score: i32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let canvas_width = 1150.0;
        Self {
            canvas_width,
            canvas_height: 600.0,
            ball_radius: 15.0,
            paddle_width: 30.0,
            paddle_height: 150.0,
            paddle_base_speed: 0.8,
            paddle_speed_max: 1.1,
            ball_speed_max: canvas_width / 1000.0,
            winning_score: 5,
        }
    }
}

impl MatchConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// The ball speed ceiling follows the canvas width when it is overridden.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(width) = env_f64("PONG_CANVAS_WIDTH")? {
            config.canvas_width = width;
            config.ball_speed_max = width / 1000.0;
        }
        if let Some(height) = env_f64("PONG_CANVAS_HEIGHT")? {
            config.canvas_height = height;
        }
        if let Some(radius) = env_f64("PONG_BALL_RADIUS")? {
            config.ball_radius = radius;
        }
        if let Some(width) = env_f64("PONG_PADDLE_WIDTH")? {
            config.paddle_width = width;
        }
        if let Some(height) = env_f64("PONG_PADDLE_HEIGHT")? {
            config.paddle_height = height;
        }
        if let Ok(raw) = std::env::var("PONG_WINNING_SCORE") {
            config.winning_score = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PONG_WINNING_SCORE",
                value: raw,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the geometry is playable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("canvas_width", self.canvas_width),
            ("canvas_height", self.canvas_height),
            ("ball_radius", self.ball_radius),
            ("paddle_width", self.paddle_width),
            ("paddle_height", self.paddle_height),
            ("paddle_base_speed", self.paddle_base_speed),
            ("paddle_speed_max", self.paddle_speed_max),
            ("ball_speed_max", self.ball_speed_max),
        ];
        for (name, value) in positives {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        if self.winning_score <= 0 {
            return Err(ConfigError::NonPositive("winning_score"));
        }

        if self.paddle_height > self.canvas_height {
            return Err(ConfigError::Geometry("paddle taller than canvas"));
        }
        if 2.0 * self.ball_radius >= self.canvas_height {
            return Err(ConfigError::Geometry("ball taller than canvas"));
        }
        if 2.0 * (self.ball_radius + self.paddle_width) >= self.canvas_width {
            return Err(ConfigError::Geometry("paddle planes overlap"));
        }

        if self.paddle_base_speed > self.paddle_speed_max {
            return Err(ConfigError::SpeedAboveCeiling("paddle_base_speed"));
        }
        if self.serve_speed(GameMode::Speed) > self.ball_speed_max {
            return Err(ConfigError::SpeedAboveCeiling("serve speed"));
        }

        Ok(())
    }

    /// Ball speed at the start of a round.
    pub fn serve_speed(&self, mode: GameMode) -> f64 {
        self.canvas_width / 2000.0 * mode.serve_multiplier()
    }

    /// Geometry view used by the physics kernel.
    pub fn arena(&self) -> Arena {
        Arena {
            width: self.canvas_width,
            height: self.canvas_height,
            ball_radius: self.ball_radius,
            paddle_width: self.paddle_width,
            paddle_height: self.paddle_height,
        }
    }
}

fn env_f64(name: &'static str) -> Result<Option<f64>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value: raw }),
        Err(_) => Ok(None),
    }
}
