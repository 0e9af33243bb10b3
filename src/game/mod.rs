//! Game Logic Module
//!
//! Everything that decides what happens in a match. Nothing here spawns
//! tasks or reads the clock; time always comes in as an argument.
//!
//! ## Module Structure
//!
//! - `config`: Geometry, speeds, game mode and match type
//! - `state`: Match state, identifiers, scoreboard
//! - `input`: Key hold tracking and paddle travel
//! - `engine`: Phase state machine and per-update physics
//! - `rating`: Elo update for ranked matches
//! - `events`: Messages pushed to clients

pub mod config;
pub mod state;
pub mod input;
pub mod engine;
pub mod rating;
pub mod events;

// Re-export key types
pub use config::{ConfigError, GameMode, MatchConfig, MatchType};
pub use state::{MatchId, MatchPhase, MatchState, PlayerId, PlayerInfo, Seat};
pub use input::{Direction, KeyState};
pub use engine::{EngineError, MatchEngine, MatchResult, Wake};
pub use rating::RatingUpdate;
pub use events::{MatchEvent, Snapshot};
